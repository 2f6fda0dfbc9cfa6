use maud::html;

use super::model::MenuView;
use crate::app::{
    layout::{fatal_error_panel, page, product_card, spinner},
    presentation::UiPhase,
};

pub fn render_menu(view: &MenuView, admin_url: &str) -> String {
    let body = html! {
        header {
            h1 { "Digital Menu" }
        }
        @match &view.phase {
            UiPhase::FatalError { message } => {
                (fatal_error_panel(message))
            }
            UiPhase::Loading => {
                (spinner("Loading menu..."))
            }
            UiPhase::FallbackReadOnly => {
                div class="mb-banner" {
                    "Read-only preview: no backend is configured, so no menu items can be shown."
                }
                (empty_state(admin_url))
            }
            UiPhase::Empty => {
                (empty_state(admin_url))
            }
            UiPhase::Populated { .. } => {
                @for group in &view.sections {
                    section class="mb-section" {
                        h2 { (group.category) }
                        @for product in &group.products {
                            (product_card(product, false))
                        }
                    }
                }
            }
        }
    };
    page("Digital Menu", body)
}

fn empty_state(admin_url: &str) -> maud::Markup {
    html! {
        section class="mb-empty" {
            p { "The menu is empty right now." }
            p {
                "Add products from the "
                a href=(admin_url) { "admin panel" }
                "."
            }
        }
    }
}
