//! Menu catalog with size and extra-option pricing.
//!
//! The engine never persists menu data; this is the in-memory catalog the
//! dispatcher validates ordered items against and the gateway embeds in its
//! classifier prompt.

use serde::{Deserialize, Serialize};

/// Drink size. Prices adjust relative to the medium base price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    #[default]
    Medium,
    Large,
}

impl Size {
    /// Price adjustment in won relative to the medium base price.
    pub fn price_delta(self) -> i64 {
        match self {
            Self::Small => -500,
            Self::Medium => 0,
            Self::Large => 500,
        }
    }
}

/// Serving temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    #[default]
    Hot,
    #[serde(alias = "ice")]
    Iced,
}

/// Menu category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    /// 커피
    Coffee,
    /// 논커피 음료
    NonCoffee,
    /// 디저트
    Dessert,
}

/// A single menu entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Base price in won for a medium serving.
    pub price: u32,
    pub category: Category,
    /// Whether the item supports hot/iced and size options (desserts do not).
    pub has_drink_options: bool,
}

/// Per-unit surcharge for a named extra option, in won.
///
/// Unknown options are free rather than rejected: the classifier sometimes
/// invents phrasing variants and pricing should not fail the order.
pub fn extra_price(option: &str) -> u32 {
    match option {
        "샷추가" => 500,
        "시럽추가" => 300,
        "휘핑추가" => 500,
        _ => 0,
    }
}

/// The menu catalog.
#[derive(Debug, Clone)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    /// Build a menu from explicit entries.
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    /// The standard café menu.
    pub fn standard() -> Self {
        let coffee = [("아메리카노", 4_000), ("카페라떼", 4_500), ("카푸치노", 5_000), ("에스프레소", 3_000)];
        let non_coffee = [("초코라떼", 5_000), ("그린티라떼", 5_500), ("밀크티", 4_500)];
        let dessert = [("치즈케이크", 6_000), ("초코케이크", 5_500), ("크로플", 4_000)];

        let mut items = Vec::new();
        let mut id = 0_u32;
        let mut push = |name: &str, price: u32, category: Category, drinks: bool| {
            id += 1;
            items.push(MenuItem {
                id: id.to_string(),
                name: name.to_owned(),
                price,
                category,
                has_drink_options: drinks,
            });
        };
        for (name, price) in coffee {
            push(name, price, Category::Coffee, true);
        }
        for (name, price) in non_coffee {
            push(name, price, Category::NonCoffee, true);
        }
        for (name, price) in dessert {
            push(name, price, Category::Dessert, false);
        }
        Self { items }
    }

    /// All menu entries.
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Look up a menu entry by exact name.
    pub fn find(&self, name: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Entries in the given category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(move |item| item.category == category)
    }

    /// Unit price for an item at the given size with the given extras.
    ///
    /// Desserts ignore the size adjustment.
    pub fn unit_price(&self, item: &MenuItem, size: Size, extras: &[String]) -> u32 {
        let base = i64::from(item.price);
        let sized = if item.has_drink_options {
            base + size.price_delta()
        } else {
            base
        };
        let extras_total: i64 = extras.iter().map(|o| i64::from(extra_price(o))).sum();
        u32::try_from((sized + extras_total).max(0)).unwrap_or(0)
    }

    /// One-line menu summary for the classifier prompt, grouped by category.
    pub fn prompt_listing(&self) -> String {
        let group = |label: &str, category: Category| {
            let entries: Vec<String> = self
                .by_category(category)
                .map(|item| format!("{}({})", item.name, item.price))
                .collect();
            format!("[{label}] {}", entries.join(", "))
        };
        format!(
            "{}\n{}\n{}",
            group("커피", Category::Coffee),
            group("논커피", Category::NonCoffee),
            group("디저트", Category::Dessert),
        )
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::standard()
    }
}
