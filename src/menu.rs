//! WOOSH CAFE menu catalog
//!
//! Static reference data consumed two ways: serialized to JSON and embedded
//! in the live agent's system instruction, and rendered by the `menu` CLI
//! command. Prices are either a fixed amount or freeform text (e.g. ask at
//! the counter); the serialized shape keeps the camelCase wire format the
//! agent instructions were tuned against.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Price of a menu item: a fixed amount in NTD, or freeform text for
/// ranges and ask-at-the-counter items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Fixed(u32),
    Text(String),
}

/// One orderable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub name: String,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_out: Option<bool>,
}

/// A titled group of menu items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub title: String,
    pub items: Vec<MenuItem>,
}

impl MenuItem {
    /// Item with a fixed price
    pub fn fixed(name: &str, price: u32) -> Self {
        Self {
            name: name.to_string(),
            price: Price::Fixed(price),
            tags: None,
            description: None,
            sold_out: None,
        }
    }

    /// Item whose price is freeform text
    pub fn quoted(name: &str, price: &str) -> Self {
        Self {
            name: name.to_string(),
            price: Price::Text(price.to_string()),
            tags: None,
            description: None,
            sold_out: None,
        }
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn sold_out(mut self) -> Self {
        self.sold_out = Some(true);
        self
    }
}

impl MenuCategory {
    pub fn new(title: &str, items: Vec<MenuItem>) -> Self {
        Self {
            title: title.to_string(),
            items,
        }
    }
}

/// The full café catalog
pub static MENU_DATA: Lazy<Vec<MenuCategory>> = Lazy::new(|| {
    vec![
        MenuCategory::new(
            "義式咖啡 (Espresso, Milk)",
            vec![
                MenuItem::fixed("燕麥拿鐵", 170).tags(&["H", "I"]),
                MenuItem::fixed("岩鹽拿鐵", 170).tags(&["H", "I"]),
                MenuItem::fixed("拿鐵", 160).tags(&["H", "I"]),
                MenuItem::fixed("西西里變奏", 160).tags(&["I"]),
                MenuItem::fixed("西西里", 140).tags(&["I"]),
                MenuItem::fixed("美式", 120).tags(&["H", "I"]),
                MenuItem::fixed("美式氣泡", 120).tags(&["I"]),
                MenuItem::fixed("濃縮", 90)
                    .tags(&["H"])
                    .description("雙倍濃縮 +$40 / 咖啡品項加 $40 可享切片法式長棍"),
            ],
        ),
        MenuCategory::new(
            "手沖精品咖啡 (Pour Over)",
            vec![
                MenuItem::fixed("嘉義 阿里山 卓武山莊園 [厭氧日曬]", 300),
                MenuItem::fixed("衣索比亞 班奇馬吉 寶貝藝妓 [水洗]", 200),
                MenuItem::fixed("肯亞 琪瑪安圖處理場 珍珠圓豆 [水洗]", 190),
                MenuItem::fixed("哥倫比亞 蒙特拿莊園 [酵素氧氣日曬]", 220),
                MenuItem::fixed("哥斯大黎加 咖啡花莊園 [黃蜜處理]", 180),
                MenuItem::fixed("巴拿馬 波奎特 凱薩路易斯 [水洗]", 160),
                MenuItem::fixed("秘魯 庫斯料 約克之星 [水洗]", 0).sold_out(),
                MenuItem::fixed("巴布亞新幾內亞 亞黑十字 [水洗]", 180),
                MenuItem::fixed("印尼 曼特寧 G1 [濕制]", 160),
                MenuItem::quoted("冰滴 (夏季限定)", "洽櫃台"),
            ],
        ),
        MenuCategory::new(
            "特調飲品與果汁",
            vec![
                MenuItem::fixed("小情歌 莓果茶", 200).tags(&["H", "I"]),
                MenuItem::fixed("花園派對 蘋果花茶", 200).tags(&["H", "I"]),
                MenuItem::fixed("漫遊花園 綠博士茶", 200).tags(&["H", "I"]),
                MenuItem::fixed("香料可爾必思特調", 200).tags(&["I"]),
                MenuItem::fixed("白桃蘋果氣泡飲", 160).tags(&["I"]),
                MenuItem::fixed("黑醋栗薄荷氣泡飲", 160).tags(&["I"]),
                MenuItem::fixed("荔枝玫瑰氣泡飲", 160).tags(&["I"]),
                MenuItem::fixed("康普茶", 150).tags(&["罐"]),
                MenuItem::fixed("Granini 西洋梨汁", 120).tags(&["罐"]),
                MenuItem::fixed("Granini 葡萄汁", 120).tags(&["罐"]),
            ],
        ),
        MenuCategory::new(
            "其他飲品",
            vec![
                MenuItem::fixed("抹茶歐蕾", 140).tags(&["H", "I"]),
                MenuItem::fixed("法芙娜可可歐蕾", 140).tags(&["H", "I"]),
                MenuItem::fixed("燕麥奶", 80).tags(&["H", "I"]),
                MenuItem::fixed("鮮奶", 70).tags(&["H", "I"]),
            ],
        ),
        MenuCategory::new(
            "輕食、披薩與甜點",
            vec![
                MenuItem::fixed("葛瑪蘭黑豚火腿法棍", 350),
                MenuItem::fixed("煙燻牛肉法棍", 300),
                MenuItem::fixed("冷燻鮭魚小餐包", 300),
                MenuItem::fixed("蛋沙拉小餐包", 250),
                MenuItem::fixed("白松露焗烤馬鈴薯", 180),
                MenuItem::fixed("蘑菇洋蔥佛卡夏", 150),
                MenuItem::fixed("法式長棍麵包", 150),
                MenuItem::fixed("慕尼黑德腸薄片 Pizza (8吋)", 220),
                MenuItem::fixed("墨西哥雞肉薄片 Pizza (8吋)", 220),
                MenuItem::fixed("田園派對薄片 Pizza (素, 8吋)", 220),
                MenuItem::fixed("AFFOGATO 阿芙佳朵", 150).tags(&["夏季限定"]),
                MenuItem::fixed("自製優格 (搭配四種當季水果)", 150),
                MenuItem::quoted("其他自製甜點、蛋糕", "洽櫃台"),
            ],
        ),
    ]
});

/// Serialize the catalog to the JSON context string embedded in agent
/// instructions.
pub fn menu_context() -> String {
    serialize_catalog(&MENU_DATA)
}

/// Serialize an arbitrary catalog (tests pass trimmed fixtures)
pub fn serialize_catalog(catalog: &[MenuCategory]) -> String {
    serde_json::to_string(catalog).unwrap_or_else(|_| "[]".to_string())
}

/// Render the catalog as plain text for the `menu` CLI command
pub fn render_catalog(catalog: &[MenuCategory]) -> String {
    let mut out = String::new();
    for category in catalog {
        out.push_str(&format!("== {} ==\n", category.title));
        for item in &category.items {
            let price = match &item.price {
                Price::Fixed(amount) => format!("${amount}"),
                Price::Text(text) => text.clone(),
            };
            let sold_out = if item.sold_out == Some(true) {
                " (售完)"
            } else {
                ""
            };
            out.push_str(&format!("  {:<6} {}{}\n", price, item.name, sold_out));
            if let Some(description) = &item.description {
                out.push_str(&format!("         {}\n", description));
            }
        }
        out.push('\n');
    }
    out
}
