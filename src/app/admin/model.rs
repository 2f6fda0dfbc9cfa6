//! 管理面板数据模型

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::{
        model::{Category, NewProduct, Product},
        presentation::UiPhase,
    },
    core::error::CoreError,
    infrastructure::backend::ServerTimestamp,
};

/// 表单原始输入，价格保持文本形式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: Category,
}

/// 强制转换后的待校验产品
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ProductCandidate {
    #[validate(length(min = 1, message = "Product name is required."))]
    pub name: String,
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "Price must be greater than zero."))]
    pub price: f64,
    pub category: Category,
}

impl ProductCandidate {
    pub fn from_form(form: &ProductForm) -> Self {
        Self {
            name: form.name.trim().to_string(),
            description: form.description.trim().to_string(),
            price: round_to_cents(coerce_price(&form.price)),
            category: form.category,
        }
    }

    pub fn into_new_product(self, created_by: Option<String>) -> NewProduct {
        NewProduct {
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            available: true,
            created_at: ServerTimestamp,
            created_by,
        }
    }
}

/// 非数字或非有限值按 0 处理
pub fn coerce_price(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
        .unwrap_or(0.0)
}

pub fn round_to_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// 表单状态
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub values: ProductForm,
    pub error: Option<String>,
    pub is_submitting: bool,
    pub last_created: Option<String>,
}

/// 管理面板在某一时刻的完整投影
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub phase: UiPhase,
    pub products: Vec<Product>,
    pub form: FormState,
    pub user_id: Option<String>,
    pub app_id: String,
}

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created { id: String },
    /// 校验未通过，没有调用后端
    Rejected(CoreError),
    Failed(CoreError),
    /// 已有提交在进行中
    Busy,
    /// 等待期间界面已卸载，结果被丢弃
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, price: &str) -> ProductForm {
        ProductForm {
            name: name.to_string(),
            price: price.to_string(),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_price_coercion() {
        assert_eq!(coerce_price("2.5"), 2.5);
        assert_eq!(coerce_price(" 3 "), 3.0);
        assert_eq!(coerce_price("abc"), 0.0);
        assert_eq!(coerce_price(""), 0.0);
        assert_eq!(coerce_price("inf"), 0.0);
        assert_eq!(coerce_price("NaN"), 0.0);
        assert_eq!(round_to_cents(2.456), 2.46);
        assert_eq!(round_to_cents(2.5), 2.5);
    }

    #[test]
    fn test_candidate_trims_and_rounds() {
        let candidate = ProductCandidate::from_form(&ProductForm {
            name: "  Tea ".to_string(),
            description: " hot ".to_string(),
            price: "2.499".to_string(),
            category: Category::Drink,
        });
        assert_eq!(candidate.name, "Tea");
        assert_eq!(candidate.description, "hot");
        assert_eq!(candidate.price, 2.5);
        assert!(candidate.validate().is_ok());
    }

    #[test]
    fn test_validation_messages() {
        let err = ProductCandidate::from_form(&form("   ", "abc"))
            .validate()
            .unwrap_err();
        assert_eq!(
            CoreError::from(err),
            CoreError::Validation(
                "Product name is required. Price must be greater than zero.".to_string()
            )
        );
    }

    #[test]
    fn test_price_rounding_to_zero_is_rejected() {
        let candidate = ProductCandidate::from_form(&form("Mint", "0.004"));
        assert_eq!(candidate.price, 0.0);
        assert!(candidate.validate().is_err());

        assert!(ProductCandidate::from_form(&form("Mint", "-1"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_new_product_defaults() {
        let product = ProductCandidate::from_form(&form("Tea", "2.5"))
            .into_new_product(Some("u1".to_string()));
        assert!(product.available);
        assert_eq!(product.category, Category::MainDish);
        assert_eq!(product.created_by.as_deref(), Some("u1"));
    }

    #[test]
    fn test_form_deserializes_category_label() {
        let form: ProductForm =
            serde_json::from_str(r#"{"name":"Tea","price":"2.5","category":"Drink"}"#).unwrap();
        assert_eq!(form.category, Category::Drink);
        assert_eq!(form.description, "");
    }
}
