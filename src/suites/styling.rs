//! Computed styles, hover transitions and responsive layout

use futures::future::BoxFuture;
use std::time::Duration;

use crate::expect::expect;
use crate::page::Locator;
use crate::runner::{CaseContext, TestCase};
use crate::Result;

const SUITE: &str = "styling";

/// Longest hover transition on the site is 300ms; leave room for it to finish
const TRANSITION_TIMEOUT: Duration = Duration::from_secs(2);

const RENDER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new(SUITE, "homepage_stylesheets", homepage_stylesheets),
        TestCase::new(SUITE, "kamakshi_image_displayed", kamakshi_image_displayed),
        TestCase::new(SUITE, "sloka_font", sloka_font),
        TestCase::new(SUITE, "main_link_hover", main_link_hover),
        TestCase::new(SUITE, "search_box_rounded", search_box_rounded),
        TestCase::new(SUITE, "name_card_hover", name_card_hover),
        TestCase::new(SUITE, "filter_button_styled", filter_button_styled),
        TestCase::new(SUITE, "sticky_gradient_navigation", sticky_gradient_navigation),
        TestCase::new(SUITE, "nav_button_styled", nav_button_styled),
        TestCase::new(SUITE, "disabled_button_faded", disabled_button_faded),
        TestCase::new(SUITE, "nav_button_hover", nav_button_hover),
        TestCase::new(SUITE, "name_title_prominent", name_title_prominent),
        TestCase::new(SUITE, "mantra_background", mantra_background),
        TestCase::new(SUITE, "balatapa_background", balatapa_background),
        TestCase::new(SUITE, "commentary_headers_distinct", commentary_headers_distinct),
        TestCase::new(SUITE, "commentary_header_hover", commentary_header_hover),
        TestCase::new(SUITE, "collapsible_transition", collapsible_transition),
        TestCase::new(SUITE, "mobile_navigation_wraps", mobile_navigation_wraps),
        TestCase::new(SUITE, "tablet_title_visible", tablet_title_visible),
        TestCase::new(SUITE, "desktop_max_width", desktop_max_width),
        TestCase::new(SUITE, "devanagari_font_loaded", devanagari_font_loaded),
    ]
}

/// Hover `locator` and wait for `property` to settle on a new value
async fn hover_change(locator: &Locator<'_>, property: &str) -> Result<(String, String)> {
    let before = locator.computed_style(&[property]).await?;
    locator.hover().await?;
    let after = locator
        .wait_for_style_change(property, &before, TRANSITION_TIMEOUT)
        .await?;
    Ok((before.require(property)?.to_string(), after.require(property)?.to_string()))
}

fn homepage_stylesheets(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let page = &ctx.page;

        expect(page.locator(r#"link[rel="stylesheet"]"#).count().await?)
            .context(r#"link[rel="stylesheet"]"#)
            .to_be_greater_than(0usize)?;
        expect(page.locator(r#"link[href*="home/styles.css"]"#).count().await?)
            .context(r#"link[href*="home/styles.css"]"#)
            .to_equal(1usize)
    })
}

fn kamakshi_image_displayed(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let image = ctx.page.locator("img.kamakshi");

        let style = image.computed_style(&["display"]).await?;
        expect(style.require("display")?).context("img.kamakshi display").not_to_equal("none")?;
        expect(image.is_visible().await?).context("img.kamakshi visible").to_be_true()
    })
}

fn sloka_font(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let style = ctx.page.locator(".sloka").first().computed_style(&["font-family"]).await?;
        expect(style.require("font-family")?)
            .context(".sloka font-family")
            .to_contain("Annapurna SIL")
    })
}

fn main_link_hover(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/").await?;
        let (before, after) = hover_change(&ctx.page.locator("a.main-link"), "transform").await?;
        expect(after).context("a.main-link transform on hover").not_to_equal(before)
    })
}

fn search_box_rounded(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        let style = ctx
            .page
            .locator("#searchBox")
            .computed_style(&["width", "border-radius"])
            .await?;

        expect(style.px("width")?).context("#searchBox width").to_be_greater_than(0)?;
        expect(style.require("border-radius")?)
            .context("#searchBox border-radius")
            .not_to_equal("0px")
    })
}

fn name_card_hover(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        let card = ctx.page.wait_for_selector(".name-card", RENDER_TIMEOUT).await?.first();

        let padding = card.computed_style(&["padding"]).await?;
        expect(padding.require("padding")?).context(".name-card padding").not_to_equal("0px")?;

        let (before, after) = hover_change(&card, "box-shadow").await?;
        expect(after).context(".name-card box-shadow on hover").not_to_equal(before)
    })
}

fn filter_button_styled(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/").await?;
        let style = ctx
            .page
            .locator("#filterToggleBtn")
            .computed_style(&["cursor", "border-radius"])
            .await?;

        expect(style.require("cursor")?).context("#filterToggleBtn cursor").to_equal("pointer")?;
        expect(style.require("border-radius")?)
            .context("#filterToggleBtn border-radius")
            .not_to_equal("0px")
    })
}

fn sticky_gradient_navigation(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator(".navigation")
            .computed_style(&["position", "background"])
            .await?;

        expect(style.require("position")?).context(".navigation position").to_equal("sticky")?;
        expect(style.require("background")?)
            .context(".navigation background")
            .to_contain("gradient")
    })
}

fn nav_button_styled(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator("#nextBtn")
            .computed_style(&["cursor", "border-radius"])
            .await?;

        expect(style.require("cursor")?).context("#nextBtn cursor").to_equal("pointer")?;
        expect(style.require("border-radius")?)
            .context("#nextBtn border-radius")
            .not_to_equal("0px")
    })
}

fn disabled_button_faded(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let prev = ctx.page.locator("#prevBtn");

        expect(prev.is_disabled().await?).context("#prevBtn disabled").to_be_true()?;
        let opacity = prev.computed_style(&["opacity"]).await?.number("opacity")?;
        expect(opacity).context("#prevBtn opacity").to_be_less_than(1.0)
    })
}

fn nav_button_hover(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        // Page 2, so neither button is disabled
        ctx.open("/naamani/2/").await?;
        let (before, after) = hover_change(&ctx.page.locator("#nextBtn"), "transform").await?;
        expect(after).context("#nextBtn transform on hover").not_to_equal(before)
    })
}

fn name_title_prominent(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator(".name-title")
            .computed_style(&["font-size", "font-weight", "font-family"])
            .await?;

        expect(style.px("font-size")?).context(".name-title font-size").to_be_greater_than(20)?;
        // Computed weights are numeric; bold is 700
        expect(style.number("font-weight")?)
            .context(".name-title font-weight")
            .to_be_at_least(700)?;
        expect(style.require("font-family")?)
            .context(".name-title font-family")
            .to_contain("Annapurna SIL")
    })
}

fn mantra_background(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator("#mantra-section")
            .computed_style(&["background", "border-radius", "padding"])
            .await?;

        expect(style.require("background")?)
            .context("#mantra-section background")
            .to_contain("rgb(240, 248, 255)")?;
        expect(style.require("border-radius")?)
            .context("#mantra-section border-radius")
            .not_to_equal("0px")?;
        expect(style.require("padding")?)
            .context("#mantra-section padding")
            .not_to_equal("0px")
    })
}

fn balatapa_background(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator("#balatapa-section")
            .computed_style(&["background", "border-left"])
            .await?;

        expect(style.require("background")?)
            .context("#balatapa-section background")
            .to_contain("rgb(255, 248, 220)")?;
        expect(style.require("border-left")?)
            .context("#balatapa-section border-left")
            .to_contain("4px")
    })
}

fn commentary_headers_distinct(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        let jayamangala = page
            .locator(".collapsible-commentary-header.jayamangala")
            .computed_style(&["background"])
            .await?;
        let soubhagya = page
            .locator(".collapsible-commentary-header.soubhagya")
            .computed_style(&["background"])
            .await?;

        expect(jayamangala.require("background")?)
            .context("commentary header backgrounds")
            .not_to_equal(soubhagya.require("background")?)
    })
}

fn commentary_header_hover(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let header = ctx.page.locator(".collapsible-commentary-header.jayamangala");
        let (before, after) = hover_change(&header, "background").await?;
        expect(after).context("jayamangala header background on hover").not_to_equal(before)
    })
}

fn collapsible_transition(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        let style = ctx
            .page
            .locator("#jayamangala-collapsible")
            .computed_style(&["transition"])
            .await?;
        expect(style.require("transition")?)
            .context("#jayamangala-collapsible transition")
            .to_contain("max-height")
    })
}

fn mobile_navigation_wraps(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.page.set_viewport_size(375, 667).await?;
        ctx.open("/naamani/1/").await?;
        let page = &ctx.page;

        let nav = page.locator(".navigation").computed_style(&["flex-wrap"]).await?;
        expect(nav.require("flex-wrap")?).context(".navigation flex-wrap").to_equal("wrap")?;

        let content = page.locator(".content").computed_style(&["padding"]).await?;
        expect(content.require("padding")?).context(".content padding").not_to_equal("0px")
    })
}

fn tablet_title_visible(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.page.set_viewport_size(768, 1024).await?;
        ctx.open("/naamani/1/").await?;
        expect(ctx.page.locator(".name-title").is_visible().await?)
            .context(".name-title visible at 768px")
            .to_be_true()
    })
}

fn desktop_max_width(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.page.set_viewport_size(1920, 1080).await?;
        ctx.open("/naamani/1/").await?;
        let style = ctx.page.locator(".content").computed_style(&["max-width"]).await?;
        expect(style.require("max-width")?).context(".content max-width").to_equal("1200px")
    })
}

fn devanagari_font_loaded(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        ctx.open("/naamani/1/").await?;
        expect(ctx.page.locator(r#"link[href*="Annapurna"]"#).count().await?)
            .context(r#"link[href*="Annapurna"]"#)
            .to_be_greater_than(0usize)
    })
}
