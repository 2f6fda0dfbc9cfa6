//! 页面外壳与共用片段

use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::model::Product;

pub fn page(title: &str, body: Markup) -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(styles())) }
            }
            body {
                main class="mb-shell" { (body) }
            }
        }
    };
    markup.into_string()
}

pub fn spinner(label: &str) -> Markup {
    html! {
        div class="mb-loading" role="status" {
            div class="mb-spinner" {}
            p { (label) }
        }
    }
}

pub fn fatal_error_panel(message: &str) -> Markup {
    html! {
        section class="mb-fatal" role="alert" {
            h2 { "Something went wrong" }
            p { (message) }
            p class="mb-muted" { "Reload the page to try again." }
        }
    }
}

pub fn product_card(product: &Product, show_availability: bool) -> Markup {
    html! {
        article class="mb-card" data-id=(product.id) {
            header {
                h3 { (product.name) }
                span class="mb-price" { "$" (product.display_price()) }
            }
            p { (product.description_or_default()) }
            @if show_availability {
                p class="mb-muted" {
                    (product.category_label())
                    " · "
                    @if product.available { "Available" } @else { "Unavailable" }
                    @if let Some(created_at) = product.created_at_display() {
                        " · " (created_at)
                    }
                }
            }
        }
    }
}

fn styles() -> &'static str {
    r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #faf7f2; color: #222; }
.mb-shell { max-width: 960px; margin: 0 auto; padding: 2rem 1rem; }
.mb-card { background: #fff; border-radius: 8px; padding: 1rem; margin-bottom: 0.75rem; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
.mb-card header { display: flex; justify-content: space-between; align-items: baseline; }
.mb-card h3 { margin: 0; }
.mb-price { font-weight: 600; color: #b45309; }
.mb-muted { color: #666; font-size: 0.9rem; }
.mb-loading { text-align: center; padding: 4rem 0; }
.mb-spinner { width: 2rem; height: 2rem; margin: 0 auto 1rem; border: 3px solid #ddd; border-top-color: #b45309; border-radius: 50%; }
.mb-fatal { background: #fee2e2; border: 1px solid #fca5a5; border-radius: 8px; padding: 1.5rem; }
.mb-banner { background: #fef3c7; border-radius: 8px; padding: 0.75rem 1rem; margin-bottom: 1rem; }
.mb-form { display: grid; gap: 0.75rem; background: #fff; padding: 1rem; border-radius: 8px; margin-bottom: 2rem; }
.mb-form-error { color: #b91c1c; }
"#
}
