//! URL structure, navigation flows and data loading

use futures::future::BoxFuture;
use std::time::Duration;

use crate::expect::expect;
use crate::page::{PageEvent, UrlPattern};
use crate::runner::{CaseContext, TestCase};
use crate::Result;

const SUITE: &str = "navigation";

/// Time allowed for client-side data to render after load
const RENDER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new(SUITE, "homepage_loads", homepage_loads),
        TestCase::new(SUITE, "homepage_links_names_list", homepage_links_names_list),
        TestCase::new(SUITE, "homepage_stylesheet", homepage_stylesheet),
        TestCase::new(SUITE, "names_list_search_box", names_list_search_box),
        TestCase::new(SUITE, "names_list_home_button", names_list_home_button),
        TestCase::new(SUITE, "names_list_loads_all_names", names_list_loads_all_names),
        TestCase::new(SUITE, "name_card_opens_name_page", name_card_opens_name_page),
        TestCase::new(SUITE, "name_page_controls", name_page_controls),
        TestCase::new(SUITE, "sanskrit_numeral", sanskrit_numeral),
        TestCase::new(SUITE, "prev_disabled_on_first", prev_disabled_on_first),
        TestCase::new(SUITE, "prev_enabled_on_second", prev_enabled_on_second),
        TestCase::new(SUITE, "next_button", next_button),
        TestCase::new(SUITE, "arrow_key_navigation", arrow_key_navigation),
        TestCase::new(SUITE, "number_row_returns_to_list", number_row_returns_to_list),
        TestCase::new(SUITE, "mantra_section_visible", mantra_section_visible),
        TestCase::new(SUITE, "balatapa_section_visible", balatapa_section_visible),
        TestCase::new(SUITE, "commentary_collapsible", commentary_collapsible),
        TestCase::new(SUITE, "no_redirects", no_redirects),
        TestCase::new(SUITE, "name_data_loaded", name_data_loaded),
        TestCase::new(SUITE, "commentary_without_errors", commentary_without_errors),
        TestCase::new(SUITE, "cache_busting_requests", cache_busting_requests),
        TestCase::new(SUITE, "images_have_alt_text", images_have_alt_text),
        TestCase::new(SUITE, "nav_buttons_labelled", nav_buttons_labelled),
    ]
}

fn name_page_two() -> Result<UrlPattern> {
    UrlPattern::glob("**/naamani/2/**")
}

fn homepage_loads(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        ctx.open("/").await?;

        expect(page.title().await?).context("title").to_equal("KaamakshiDarpanam")?;
        expect(page.locator("img.kamakshi").count().await?)
            .context("img.kamakshi")
            .to_equal(1usize)?;
        expect(page.locator(".sloka").count().await?)
            .context(".sloka")
            .to_be_greater_than(0usize)
    })
}

fn homepage_links_names_list(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let link = ctx.page.locator("a.main-link");

        expect(link.get_attribute("href").await?)
            .context("a.main-link href")
            .to_equal(Some("naamani/".to_string()))?;
        expect(link.text_content().await?)
            .context("a.main-link")
            .to_contain("ललितासहस्रनामानि")
    })
}

fn homepage_stylesheet(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let hrefs = ctx
            .page
            .locator(r#"link[rel="stylesheet"]"#)
            .all_attributes("href")
            .await?;

        let found = hrefs.iter().flatten().any(|href| href.contains("home/styles.css"));
        expect(found).context("stylesheet hrefs include home/styles.css").to_be_true()
    })
}

fn names_list_search_box(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;

        expect(ctx.page.title().await?).context("title").to_contain("All Names Index")?;
        expect(ctx.page.locator("#searchBox").count().await?)
            .context("#searchBox")
            .to_equal(1usize)
    })
}

fn names_list_home_button(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        expect(ctx.page.locator("a.home-button").get_attribute("href").await?)
            .context("a.home-button href")
            .to_equal(Some("../".to_string()))
    })
}

fn names_list_loads_all_names(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        let page = &ctx.page;
        page.wait_for_selector(".name-card", RENDER_TIMEOUT).await?;

        expect(page.locator(".name-card").count().await?)
            .context(".name-card")
            .to_equal(1000usize)
    })
}

fn name_card_opens_name_page(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        let page = &ctx.page;
        page.wait_for_selector(".name-card", RENDER_TIMEOUT).await?;

        page.locator(".name-card").first().click().await?;
        let url = page
            .wait_for_url(&UrlPattern::glob("**/naamani/1/**")?, RENDER_TIMEOUT)
            .await?;
        expect(url).context("url").to_contain("/naamani/1/")
    })
}

fn name_page_controls(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        expect(page.title().await?).context("title").to_contain("Lalita Sahasranama")?;
        expect(page.locator("#prevBtn").count().await?).context("#prevBtn").to_equal(1usize)?;
        expect(page.locator("#nextBtn").count().await?).context("#nextBtn").to_equal(1usize)
    })
}

fn sanskrit_numeral(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        expect(ctx.page.locator("#nameNumber").text_content().await?)
            .context("#nameNumber")
            .to_equal("१")
    })
}

fn prev_disabled_on_first(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let prev = ctx.page.locator("#prevBtn");

        expect(prev.is_disabled().await?).context("#prevBtn disabled").to_be_true()?;
        let opacity = prev.computed_style(&["opacity"]).await?.number("opacity")?;
        expect(opacity).context("#prevBtn opacity").to_be_less_than(1.0)
    })
}

fn prev_enabled_on_second(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/2/").await?;
        expect(ctx.page.locator("#prevBtn").is_disabled().await?)
            .context("#prevBtn disabled")
            .to_be_false()
    })
}

fn next_button(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        page.locator("#nextBtn").click().await?;
        let url = page.wait_for_url(&name_page_two()?, RENDER_TIMEOUT).await?;
        expect(url).context("url").to_contain("/naamani/2/")
    })
}

fn arrow_key_navigation(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        page.press("ArrowRight").await?;
        let url = page.wait_for_url(&name_page_two()?, RENDER_TIMEOUT).await?;
        expect(url).context("url").to_contain("/naamani/2/")
    })
}

fn number_row_returns_to_list(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        page.locator(".number-row").click().await?;
        let url = page
            .wait_for_url(&UrlPattern::regex(r"/naamani/?$")?, RENDER_TIMEOUT)
            .await?;
        expect(url).context("url").to_match(r"/naamani/?$")
    })
}

fn mantra_section_visible(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let section = ctx.page.locator("#mantra-section");

        expect(section.is_visible().await?).context("#mantra-section visible").to_be_true()?;
        expect(section.text_content().await?)
            .context("#mantra-section")
            .to_contain("नाममन्त्रः")
    })
}

fn balatapa_section_visible(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let section = ctx.page.locator("#balatapa-section");

        expect(section.is_visible().await?).context("#balatapa-section visible").to_be_true()?;
        expect(section.text_content().await?)
            .context("#balatapa-section")
            .to_contain("बालातपा")
    })
}

fn commentary_collapsible(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;
        let header = page.locator(".collapsible-commentary-header.jayamangala");
        let panel = page.locator("#jayamangala-collapsible");

        expect(header.has_class("collapsed").await?)
            .context("jayamangala header collapsed")
            .to_be_true()?;
        let text_before = panel.text_content().await?;

        header.click().await?;
        panel.wait_for_class("expanded", true, RENDER_TIMEOUT).await?;

        expect(panel.text_content().await?)
            .context("#jayamangala-collapsible")
            .to_equal(text_before)
    })
}

fn no_redirects(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        for path in ["/", "/naamani/", "/naamani/1/", "/naamani/500/", "/naamani/1000/"] {
            let requested = ctx.url(path);
            let response = ctx.page.goto(&requested).await?;

            expect(response.status).context(format!("status of {}", path)).to_equal(Some(200u16))?;
            expect(ctx.page.url().await?)
                .context(format!("final url of {}", path))
                .to_equal(requested)?;
        }
        Ok(())
    })
}

fn name_data_loaded(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let title = ctx.page.wait_for_selector(".name-title", RENDER_TIMEOUT).await?;

        let text = title.text_content().await?;
        expect(text.as_str()).context(".name-title").not_to_equal("Loading...")?;
        expect(text.as_str()).context(".name-title").not_to_be_empty()
    })
}

fn commentary_without_errors(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let content = ctx.page.wait_for_selector("#content", RENDER_TIMEOUT).await?;
        expect(content.inner_html().await?)
            .context("#content")
            .not_to_contain("Error loading")
    })
}

fn cache_busting_requests(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let mut events = page.subscribe().await?;
        ctx.open("/naamani/1/").await?;
        // Data files are requested after load; nothing signals when the last one went out
        page.settle(Duration::from_secs(2)).await?;

        let data_requests: Vec<String> = events
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                PageEvent::Request { url, .. } if url.contains(".txt") || url.contains(".json") => Some(url),
                _ => None,
            })
            .collect();

        let busted = data_requests.iter().any(|url| url.contains("?t="));
        expect(busted)
            .context(format!("{} data requests carry ?t=", data_requests.len()))
            .to_be_true()
    })
}

fn images_have_alt_text(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        expect(ctx.page.title().await?).context("title").not_to_be_empty()?;

        let alts = ctx.page.locator("img").all_attributes("alt").await?;
        for (i, alt) in alts.into_iter().enumerate() {
            let alt = expect(alt).context(format!("img >> nth={} alt", i)).to_be_some()?;
            expect(alt).context(format!("img >> nth={} alt", i)).not_to_be_empty()?;
        }
        Ok(())
    })
}

fn nav_buttons_labelled(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        for selector in ["#prevBtn", "#nextBtn"] {
            expect(ctx.page.locator(selector).text_content().await?)
                .context(selector)
                .not_to_be_empty()?;
        }
        Ok(())
    })
}
