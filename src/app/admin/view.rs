use maud::{html, Markup};

use super::model::{AdminView, FormState};
use crate::app::{
    layout::{fatal_error_panel, page, product_card, spinner},
    model::Category,
    presentation::UiPhase,
};

/// `form_action` 是表单提交的绝对路径
pub fn render_admin(view: &AdminView, form_action: &str) -> String {
    let body = html! {
        header {
            h1 { "Menu Admin" }
            @if let Some(user_id) = &view.user_id {
                p class="mb-muted" { "Signed in as " (user_id) " · app " (view.app_id) }
            }
        }
        @match &view.phase {
            UiPhase::FatalError { message } => {
                (fatal_error_panel(message))
            }
            UiPhase::Loading => {
                (spinner("Connecting to the menu database..."))
            }
            _ => {
                (product_form(&view.form, form_action))
                (product_list(view))
            }
        }
    };
    page("Menu Admin", body)
}

fn product_form(form: &FormState, action: &str) -> Markup {
    html! {
        form class="mb-form" method="post" action=(action) {
            h2 { "Add a product" }
            @if let Some(error) = &form.error {
                p class="mb-form-error" role="alert" { (error) }
            }
            label {
                "Name"
                input type="text" name="name" value=(form.values.name) required;
            }
            label {
                "Description"
                textarea name="description" { (form.values.description) }
            }
            label {
                "Price"
                input type="number" name="price" step="0.01" min="0" value=(form.values.price);
            }
            label {
                "Category"
                select name="category" {
                    @for category in Category::ALL {
                        option value=(category.as_str()) selected[category == form.values.category] {
                            (category.as_str())
                        }
                    }
                }
            }
            button type="submit" disabled[form.is_submitting] {
                @if form.is_submitting { "Saving..." } @else { "Add product" }
            }
        }
    }
}

fn product_list(view: &AdminView) -> Markup {
    html! {
        section class="mb-section" {
            h2 { "Products" }
            @if view.products.is_empty() {
                p class="mb-muted" { "No products yet. Use the form above to add the first one." }
            } @else {
                @for product in &view.products {
                    (product_card(product, true))
                }
            }
        }
    }
}
