//! 展示层
//!
//! 纯函数：排序、按分类分组、推导界面阶段。不做任何 I/O。

use serde::Serialize;

use super::model::Product;
use crate::core::error::CoreError;

/// 按创建时间倒序，缺少时间戳的排在最后；稳定排序
pub fn sort_newest_first(products: &mut [Product]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub fn sorted_newest_first(mut products: Vec<Product>) -> Vec<Product> {
    sort_newest_first(&mut products);
    products
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuSection {
    pub category: String,
    pub products: Vec<Product>,
}

/// 按分类分组，分组顺序为首次出现顺序，组内保持原有顺序
pub fn group_by_category(products: &[Product]) -> Vec<MenuSection> {
    let mut sections: Vec<MenuSection> = Vec::new();
    for product in products {
        let label = product.category_label();
        match sections.iter_mut().find(|section| section.category == label) {
            Some(section) => section.products.push(product.clone()),
            None => sections.push(MenuSection {
                category: label.to_string(),
                products: vec![product.clone()],
            }),
        }
    }
    sections
}

/// 推导界面阶段所需的状态
#[derive(Debug, Clone, Default)]
pub struct PhaseInputs<'a> {
    pub is_auth_ready: bool,
    pub is_loading: bool,
    pub error: Option<&'a CoreError>,
    pub is_fallback: bool,
    pub product_count: usize,
}

/// 界面阶段，优先级：错误 > 加载中 > 只读空状态 > 空状态 > 有数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum UiPhase {
    FatalError { message: String },
    Loading,
    FallbackReadOnly,
    Empty,
    Populated { count: usize },
}

impl UiPhase {
    pub fn derive(inputs: &PhaseInputs<'_>) -> Self {
        if let Some(error) = inputs.error.filter(|error| error.is_fatal()) {
            return UiPhase::FatalError {
                message: error.to_string(),
            };
        }
        if !inputs.is_auth_ready || inputs.is_loading {
            return UiPhase::Loading;
        }
        if inputs.is_fallback {
            return UiPhase::FallbackReadOnly;
        }
        if inputs.product_count == 0 {
            return UiPhase::Empty;
        }
        UiPhase::Populated {
            count: inputs.product_count,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, UiPhase::FatalError { .. })
    }
}
