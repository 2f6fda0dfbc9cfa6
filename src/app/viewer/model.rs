//! 菜单展示页视图模型

use serde::Serialize;

use crate::app::presentation::{MenuSection, UiPhase};

/// 菜单页在某一时刻的完整投影
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuView {
    pub phase: UiPhase,
    pub sections: Vec<MenuSection>,
    pub app_id: String,
    pub user_id: Option<String>,
    pub is_fallback: bool,
}

impl MenuView {
    pub fn product_count(&self) -> usize {
        self.sections.iter().map(|section| section.products.len()).sum()
    }
}
