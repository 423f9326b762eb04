//! # Naamani-E2E 命令行入口
//!
//! 启动浏览器，对 Lalita Sahasranama 网站运行端到端测试套件并输出报告。
//!
//! ## 主要功能
//! - 按 默认值 → 配置文件 → 环境变量 → 命令行参数 的顺序加载配置
//! - 启动 Chrome（或连接到已运行的实例）并并发执行用例
//! - 以文本或 JSON 格式输出每个用例的结果和汇总
//!
//! ## 退出码
//! - `0`: 所有用例通过或被跳过
//! - `1`: 存在失败或出错的用例
//! - `2`: 运行无法开始或无法正常结束（配置错误、浏览器启动失败等）
//!
//! ## 环境变量
//! - `BASE_URL` / `NAAMANI_BASE_URL`: 被测网站地址（默认: http://localhost:8000）
//! - `NAAMANI_EDIT_SERVER_URL`: 编辑服务器地址（默认: http://localhost:3000）
//! - `NAAMANI_CDP_ENDPOINT`: 连接已运行的 Chrome，而不是启动新进程
//! - `RUST_LOG`: 日志过滤器，未设置时使用配置中的 `log_level`

use anyhow::Context;
use clap::Parser;
use naamani_e2e::{config::Config, runner::Runner, suites};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// End-to-end checks for the Lalita Sahasranama website
#[derive(Debug, Parser)]
#[command(name = "naamani-e2e", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "NAAMANI_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the website under test
    #[arg(long)]
    base_url: Option<String>,

    /// Base URL of the inline-edit server
    #[arg(long)]
    edit_server_url: Option<String>,

    /// Only run cases whose `suite::name` contains this text
    #[arg(short, long)]
    filter: Option<String>,

    /// Maximum number of cases running at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Chrome executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Pass --no-sandbox to Chrome
    #[arg(long)]
    no_sandbox: bool,

    /// Write failure screenshots here
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// List the selected cases and exit
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let config = match &self.config {
            Some(path) => {
                let path = path.to_string_lossy();
                Config::from_file(&path).with_context(|| format!("loading {}", path))?
            }
            None => Config::default(),
        };
        let mut config = config.with_env().context("reading environment")?;

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(url) = &self.edit_server_url {
            config.edit_server_url = url.clone();
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(path) = &self.chrome_path {
            config.chrome_path = Some(path.clone());
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts_dir = Some(dir.clone());
        }
        if self.headed {
            config.headless = false;
        }
        if self.no_sandbox {
            config.no_sandbox = true;
        }

        config.validate().context("validating command-line options")?;
        Ok(config)
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    // Logs go to stderr so the report on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.load_config()?;
    init_tracing(&config);
    info!("Naamani-E2E v{}", naamani_e2e::VERSION);

    let runner = Runner::new(config, suites::all()).filter(cli.filter.clone().unwrap_or_default());

    if cli.list {
        for case in runner.selected() {
            let requires: Vec<String> = case.requires.iter().map(|c| c.to_string()).collect();
            if requires.is_empty() {
                println!("{}", case.id());
            } else {
                println!("{} (requires {})", case.id(), requires.join(", "));
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = runner.run().await.context("test run aborted")?;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("naamani-e2e: {:#}", e);
            ExitCode::from(2)
        }
    }
}
