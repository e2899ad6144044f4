//! Canonical text rendering of catalog records.
//!
//! The rendered block is what gets embedded and later handed to the language
//! model as context. Every section is always present; missing values render
//! as an explicit placeholder so absence is stated rather than implied.

use super::{CatalogRecord, Dish, FlavorProfile, Wine, WineFlavors};

/// Placeholder for missing free text.
pub const MISSING_TEXT: &str = "無";

/// Placeholder for a missing list.
pub const MISSING_LIST: &str = "未提供";

/// Render a record into its canonical content block.
pub fn render_record(record: &CatalogRecord) -> String {
    let content = match record {
        CatalogRecord::Dish(dish) => render_dish(dish),
        CatalogRecord::Wine(wine) => render_wine(wine),
    };
    content.trim().to_string()
}

fn render_dish(dish: &Dish) -> String {
    let ingredients = if dish.ingredients.is_empty() {
        MISSING_LIST.to_string()
    } else {
        dish.ingredients
            .iter()
            .map(|i| {
                format!(
                    "  - 食材「{}」的故事是：{}\n    其風味細節如下：\n{}",
                    i.name,
                    text_or_missing(i.story.as_deref()),
                    render_profiles(&i.flavor_profiles, 6)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# 菜品資訊：{}\n## 菜品故事\n{}\n## 食材細節\n{}\n## 價格\n{}\n## 供應狀態\n{}",
        dish.name,
        text_or_missing(dish.story.as_deref()),
        ingredients,
        format_price(dish.price),
        stock_label(dish.in_stock)
    )
}

fn render_wine(wine: &Wine) -> String {
    let flavors = match &wine.flavors {
        WineFlavors::Detailed(main) if !main.is_empty() => main
            .iter()
            .map(|mf| {
                format!(
                    "  - 主要風味「{}」的細節描述如下：\n{}",
                    mf.name,
                    render_profiles(&mf.flavor_profiles, 4)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        WineFlavors::Tags(tags) if !tags.is_empty() => {
            format!("  - 風味標籤：{}", tags.join("、"))
        }
        _ => MISSING_LIST.to_string(),
    };

    format!(
        "# 酒品資訊：{}\n## 酒品故事\n{}\n## 風味細節\n{}\n## 價格\n{}\n## 供應狀態\n{}",
        wine.name,
        text_or_missing(wine.story.as_deref()),
        flavors,
        format_price(wine.price),
        stock_label(wine.in_stock)
    )
}

fn render_profiles(profiles: &[FlavorProfile], indent: usize) -> String {
    let pad = " ".repeat(indent);
    if profiles.is_empty() {
        return format!("{}- {}", pad, MISSING_TEXT);
    }
    profiles
        .iter()
        .map(|fp| {
            format!(
                "{}- Index {}: {}",
                pad,
                text_or_missing(Some(&fp.index)),
                text_or_missing(Some(&fp.remark))
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn text_or_missing(text: Option<&str>) -> &str {
    match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => MISSING_TEXT,
    }
}

fn format_price(price: f64) -> String {
    format!("{} 元", price)
}

fn stock_label(in_stock: bool) -> &'static str {
    if in_stock {
        "供應中"
    } else {
        "暫時售完"
    }
}
