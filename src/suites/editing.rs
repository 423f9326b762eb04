//! Inline editing, only rendered when the edit server is up

use futures::future::BoxFuture;
use regex::Regex;
use std::time::Duration;

use crate::expect::expect;
use crate::probe::Capability;
use crate::runner::{CaseContext, TestCase};
use crate::{Error, Result};

const SUITE: &str = "editing";

const NEEDS_SERVER: &[Capability] = &[Capability::EditServer];

/// The edit module probes the server itself before adding its buttons
const EDIT_UI_TIMEOUT: Duration = Duration::from_secs(5);

const UI_TIMEOUT: Duration = Duration::from_secs(2);

const SAVE: &str = r#"button:has-text("💾 Save")"#;
const CANCEL: &str = r#"button:has-text("✕ Cancel")"#;

pub fn cases() -> Vec<TestCase> {
    [
        TestCase::new(SUITE, "read_endpoint", read_endpoint),
        TestCase::new(SUITE, "module_initialized", module_initialized),
        TestCase::new(SUITE, "edit_buttons_present", edit_buttons_present),
        TestCase::new(SUITE, "edit_button_position", edit_button_position),
        TestCase::new(SUITE, "edit_button_hover", edit_button_hover),
        TestCase::new(SUITE, "mantra_textarea_prepopulated", mantra_textarea_prepopulated),
        TestCase::new(SUITE, "save_cancel_colours", save_cancel_colours),
        TestCase::new(SUITE, "cancel_restores_text", cancel_restores_text),
        TestCase::new(SUITE, "arrow_keys_stay_in_textarea", arrow_keys_stay_in_textarea),
        TestCase::new(SUITE, "balatapa_edit", balatapa_edit),
        TestCase::new(SUITE, "commentary_edit_expands", commentary_edit_expands),
        TestCase::new(SUITE, "soubhagya_edit", soubhagya_edit),
        TestCase::new(SUITE, "devanagari_input", devanagari_input),
    ]
    .into_iter()
    .map(|case| case.requiring(NEEDS_SERVER))
    .collect()
}

/// Open the first name page and wait for the edit module to add its buttons
async fn open_editable(ctx: &CaseContext) -> Result<()> {
    ctx.open("/naamani/1/").await?;
    ctx.page
        .locator("#mantra-section-edit-btn")
        .wait_for(EDIT_UI_TIMEOUT)
        .await
}

/// Rendered mantra text without its "नाममन्त्रः »" label; "-" marks an empty mantra
fn mantra_without_label(rendered: &str) -> Result<String> {
    let label = Regex::new(r"नाममन्त्रः\s*»\s*").map_err(|e| Error::internal(e.to_string()))?;
    let text = label.replacen(rendered, 1, "").trim().to_string();
    Ok(if text == "-" { String::new() } else { text })
}

fn read_endpoint(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.edit_server()?.read("Mantra/0001.txt").await?;
        let described = response.success || response.error.is_some();
        expect(described)
            .context("/api/read?file=Mantra/0001.txt envelope")
            .to_be_true()
    })
}

fn module_initialized(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let mut events = ctx.page.subscribe().await?;
        ctx.open("/naamani/1/").await?;
        events
            .wait_for_console("✓ Edit module initialized", EDIT_UI_TIMEOUT)
            .await
            .map(|_| ())
    })
}

fn edit_buttons_present(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        for selector in [
            "#mantra-section-edit-btn",
            "#balatapa-section-edit-btn",
            "#jayamangala-edit-btn",
            "#soubhagya-edit-btn",
        ] {
            expect(ctx.page.locator(selector).count().await?)
                .context(selector)
                .to_equal(1usize)?;
        }
        Ok(())
    })
}

fn edit_button_position(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let style = ctx
            .page
            .locator("#mantra-section-edit-btn")
            .computed_style(&["position", "right"])
            .await?;

        expect(style.require("position")?)
            .context("#mantra-section-edit-btn position")
            .to_equal("absolute")?;
        expect(style.require("right")?)
            .context("#mantra-section-edit-btn right")
            .to_equal("10px")
    })
}

fn edit_button_hover(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let button = ctx.page.locator("#mantra-section-edit-btn");

        let before = button.computed_style(&["opacity"]).await?;
        let resting = before.number("opacity")?;
        expect(resting).context("#mantra-section-edit-btn opacity").to_be_less_than(1.0)?;

        button.hover().await?;
        let after = button.wait_for_style_change("opacity", &before, UI_TIMEOUT).await?;
        expect(after.number("opacity")?)
            .context("#mantra-section-edit-btn opacity on hover")
            .to_be_greater_than(resting)
    })
}

fn mantra_textarea_prepopulated(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        let rendered = page.locator("#mantra-section").text_content().await?;

        page.locator("#mantra-section-edit-btn").click().await?;
        let textarea = page.locator("#mantra-section textarea");
        textarea.wait_for(UI_TIMEOUT).await?;

        expect(textarea.count().await?).context("#mantra-section textarea").to_equal(1usize)?;
        expect(textarea.is_visible().await?)
            .context("#mantra-section textarea visible")
            .to_be_true()?;
        expect(textarea.get_attribute("rows").await?)
            .context("#mantra-section textarea rows")
            .to_equal(Some("2".to_string()))?;
        expect(textarea.input_value().await?)
            .context("#mantra-section textarea value")
            .to_equal(mantra_without_label(&rendered)?)?;

        let font = textarea.computed_style(&["font-family"]).await?;
        expect(font.require("font-family")?)
            .context("#mantra-section textarea font-family")
            .to_contain("Annapurna SIL")
    })
}

fn save_cancel_colours(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        page.locator("#mantra-section-edit-btn").click().await?;

        let section = page.locator("#mantra-section");
        let save = section.locator(SAVE);
        save.wait_for(UI_TIMEOUT).await?;
        let cancel = section.locator(CANCEL);

        let save_style = save.computed_style(&["background-color", "color"]).await?;
        expect(save_style.require("background-color")?)
            .context("Save background-color")
            .to_contain("rgb(76, 175, 80)")?;
        expect(save_style.require("color")?)
            .context("Save color")
            .to_contain("rgb(255, 255, 255)")?;

        let cancel_style = cancel.computed_style(&["background-color", "color"]).await?;
        expect(cancel_style.require("background-color")?)
            .context("Cancel background-color")
            .to_contain("rgb(244, 67, 54)")?;
        expect(cancel_style.require("color")?)
            .context("Cancel color")
            .to_contain("rgb(255, 255, 255)")
    })
}

fn cancel_restores_text(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        let section = page.locator("#mantra-section");
        let edit = page.locator("#mantra-section-edit-btn");
        let textarea = section.locator("textarea");
        let original = section.text_content().await?;

        edit.click().await?;
        textarea.wait_for(UI_TIMEOUT).await?;
        expect(edit.count().await?)
            .context("#mantra-section-edit-btn while editing")
            .to_equal(0usize)?;

        textarea.fill("Test mantra content").await?;
        page.locator(CANCEL).first().click().await?;
        textarea.wait_for_count(0, UI_TIMEOUT).await?;

        expect(section.text_content().await?)
            .context("#mantra-section after cancel")
            .to_equal(original)?;
        expect(edit.count().await?)
            .context("#mantra-section-edit-btn after cancel")
            .to_equal(1usize)
    })
}

fn arrow_keys_stay_in_textarea(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        page.locator("#mantra-section-edit-btn").click().await?;

        let textarea = page.locator("#mantra-section textarea");
        textarea.wait_for(UI_TIMEOUT).await?;
        textarea.fill("Test content").await?;
        let before = page.url().await?;

        textarea.press("ArrowLeft").await?;
        textarea.press("ArrowRight").await?;
        // A navigation, if any, would have started by now
        page.settle(Duration::from_millis(500)).await?;

        expect(page.url().await?).context("url after arrow keys").to_equal(before)
    })
}

fn balatapa_edit(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        let section = page.locator("#balatapa-section");
        let textarea = section.locator("textarea");

        page.locator("#balatapa-section-edit-btn").click().await?;
        textarea.wait_for(UI_TIMEOUT).await?;
        expect(textarea.get_attribute("rows").await?)
            .context("#balatapa-section textarea rows")
            .to_equal(Some("3".to_string()))?;

        textarea.fill("Test balatapa").await?;
        section.locator(CANCEL).click().await?;
        page.locator("#balatapa-section-edit-btn").wait_for(UI_TIMEOUT).await
    })
}

fn commentary_edit_expands(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        let panel = page.locator("#jayamangala-collapsible");
        let textarea = panel.locator("textarea");

        page.locator("#jayamangala-edit-btn").click().await?;
        panel.wait_for_class("expanded", true, UI_TIMEOUT).await?;
        textarea.wait_for(UI_TIMEOUT).await?;

        expect(textarea.count().await?)
            .context("#jayamangala-collapsible textarea")
            .to_equal(1usize)?;
        expect(textarea.get_attribute("rows").await?)
            .context("#jayamangala-collapsible textarea rows")
            .to_equal(Some("15".to_string()))?;

        textarea.fill("Test commentary content").await?;
        panel.locator(CANCEL).click().await?;
        textarea.wait_for_count(0, UI_TIMEOUT).await
    })
}

fn soubhagya_edit(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;

        page.locator("#soubhagya-edit-btn").click().await?;
        page.locator("#soubhagya-collapsible textarea")
            .wait_for_count(1, UI_TIMEOUT)
            .await
    })
}

fn devanagari_input(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        open_editable(ctx).await?;
        let page = &ctx.page;
        page.locator("#mantra-section-edit-btn").click().await?;

        let textarea = page.locator("#mantra-section textarea");
        textarea.wait_for(UI_TIMEOUT).await?;
        let text = "ॐ श्रीं ह्रीं क्लीं";
        textarea.fill(text).await?;

        expect(textarea.input_value().await?)
            .context("#mantra-section textarea value")
            .to_equal(text)
    })
}
