//! 产品数据模型

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::infrastructure::backend::{DocumentData, DocumentSnapshot, ServerTimestamp, Timestamp};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// 管理面板表单可选的分类
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[default]
    #[serde(rename = "Main Dish")]
    MainDish,
    Appetizer,
    Dessert,
    Drink,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::MainDish,
        Category::Appetizer,
        Category::Dessert,
        Category::Drink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MainDish => "Main Dish",
            Category::Appetizer => "Appetizer",
            Category::Dessert => "Dessert",
            Category::Drink => "Drink",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// 客户端持有的产品只读副本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Product {
    pub fn from_document(doc: &DocumentSnapshot) -> Result<Self, serde_json::Error> {
        let mut product: Product = serde_json::from_value(Value::Object(doc.data.clone()))?;
        product.id = doc.id.clone();
        Ok(product)
    }

    pub fn description_or_default(&self) -> &str {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
    }

    /// 分组标签，缺失、空白或不在固定分类中的值都归入 "Uncategorized"
    pub fn category_label(&self) -> &'static str {
        self.category
            .as_deref()
            .and_then(|category| category.trim().parse::<Category>().ok())
            .map_or(UNCATEGORIZED, |category| category.as_str())
    }

    pub fn display_price(&self) -> String {
        format!("{:.2}", self.price)
    }

    pub fn created_at_display(&self) -> Option<String> {
        self.created_at
            .and_then(|at| at.to_datetime())
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
    }
}

/// 未解析的时间戳（例如仍是占位符）按缺失处理
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// 管理面板提交的新产品
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub available: bool,
    pub created_at: ServerTimestamp,
    pub created_by: Option<String>,
}

impl NewProduct {
    pub fn into_document(self) -> Result<DocumentData, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(data) => Ok(data),
            other => Err(serde::ser::Error::custom(format!(
                "product serialized to a non-object value: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(id: &str, data: Value) -> DocumentSnapshot {
        DocumentSnapshot {
            id: id.to_string(),
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_decode_full_document() {
        let product = Product::from_document(&snapshot(
            "p1",
            json!({
                "name": "Soup",
                "description": "Hot",
                "price": 4.5,
                "category": "Appetizer",
                "available": true,
                "createdAt": {"seconds": 100, "nanoseconds": 5},
                "createdBy": "chef"
            }),
        ))
        .unwrap();

        assert_eq!(product.id, "p1");
        assert_eq!(product.display_price(), "4.50");
        assert_eq!(product.category_label(), "Appetizer");
        assert_eq!(
            product.created_at,
            Some(Timestamp {
                seconds: 100,
                nanoseconds: 5
            })
        );
    }

    #[test]
    fn test_decode_sparse_document() {
        let product = Product::from_document(&snapshot(
            "p2",
            json!({"name": "Bread", "price": 2, "createdAt": {"$serverTimestamp": true}}),
        ))
        .unwrap();

        assert_eq!(product.created_at, None);
        assert_eq!(product.description_or_default(), DEFAULT_DESCRIPTION);
        assert_eq!(product.category_label(), UNCATEGORIZED);
        assert!(!product.available);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(
            serde_json::to_value(Category::MainDish).unwrap(),
            json!("Main Dish")
        );
        assert_eq!("Drink".parse::<Category>(), Ok(Category::Drink));
        assert!("Soup".parse::<Category>().is_err());
    }

    #[test]
    fn test_unknown_category_label() {
        let mut product: Product = serde_json::from_value(json!({"name": "Soup"})).unwrap();
        for (raw, label) in [
            (" Dessert ", "Dessert"),
            ("Main Dish", "Main Dish"),
            ("Specials", UNCATEGORIZED),
            ("drink", UNCATEGORIZED),
            ("", UNCATEGORIZED),
        ] {
            product.category = Some(raw.to_string());
            assert_eq!(product.category_label(), label, "label for {raw:?}");
        }
    }

    #[test]
    fn test_new_product_document() {
        let data = NewProduct {
            name: "Tea".to_string(),
            description: String::new(),
            price: 2.5,
            category: Category::Drink,
            available: true,
            created_at: ServerTimestamp,
            created_by: Some("user-1".to_string()),
        }
        .into_document()
        .unwrap();

        assert_eq!(data["category"], json!("Drink"));
        assert_eq!(data["available"], json!(true));
        assert_eq!(data["createdBy"], json!("user-1"));
        assert!(ServerTimestamp::is_sentinel(&data["createdAt"]));
    }
}
