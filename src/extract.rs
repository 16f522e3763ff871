use serde::Serialize;
use serde_json::Value;

use crate::models::VisualMatch;

pub const NOT_AVAILABLE: &str = "N/A";

/// Normalized view of a visual match. A field is `Some` only when the
/// provider sent it with a usable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

pub fn extract_display_fields(item: &VisualMatch) -> DisplayRecord {
    let price = item.object("price");
    DisplayRecord {
        title: item.title().map(str::to_string),
        source: item.source().map(str::to_string),
        link: item.link().map(str::to_string),
        thumbnail: item.text("thumbnail").map(str::to_string),
        image: item.text("image").map(str::to_string),
        price: price.and_then(|p| scalar_text(p.get("value"))),
        extracted_price: price.and_then(|p| numeric(p.get("extracted_value"))),
        currency: price.and_then(|p| scalar_text(p.get("currency"))),
        rating: scalar_text(item.field("rating")),
        reviews: scalar_text(item.field("reviews")),
        in_stock: item.flag("in_stock"),
        condition: scalar_text(item.field("condition")),
    }
}

impl DisplayRecord {
    /// Labelled lines for the console dump; absent values print as `N/A`.
    pub fn render_lines(&self) -> Vec<String> {
        let text = |value: &Option<String>| value.as_deref().unwrap_or(NOT_AVAILABLE).to_string();
        vec![
            format!("Title: {}", text(&self.title)),
            format!("Source: {}", text(&self.source)),
            format!("Link: {}", text(&self.link)),
            format!("Price: {}", text(&self.price)),
            format!(
                "Extracted Price: {}",
                self.extracted_price
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
            ),
            format!("Currency: {}", text(&self.currency)),
            format!(
                "Rating: {}",
                self.rating
                    .as_deref()
                    .map(|value| format!("{value}/5"))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
            ),
            format!("Number of Reviews: {}", text(&self.reviews)),
            format!(
                "In Stock: {}",
                match self.in_stock {
                    Some(true) => "Yes",
                    Some(false) => "No",
                    None => NOT_AVAILABLE,
                }
            ),
            format!("Condition: {}", text(&self.condition)),
            format!("Thumbnail: {}", text(&self.thumbnail)),
            format!("Full Image: {}", text(&self.image)),
        ]
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_match_extracts_nothing() {
        let record = extract_display_fields(&VisualMatch::default());
        assert_eq!(record, DisplayRecord::default());
        for line in record.render_lines() {
            assert!(line.ends_with(NOT_AVAILABLE), "expected N/A in `{line}`");
        }
    }

    #[test]
    fn product_fields_are_extracted() {
        let item = VisualMatch::from_value(&json!({
            "title": "Desk Lamp",
            "source": "Amazon.com",
            "link": "https://www.amazon.com/dp/B0001",
            "thumbnail": "https://img.example/t.jpg",
            "image": "https://img.example/full.jpg",
            "price": {"value": "$24.99*", "extracted_value": 24.99, "currency": "$"},
            "rating": 4.6,
            "reviews": 1280,
            "in_stock": true,
            "condition": "New"
        }));
        let record = extract_display_fields(&item);
        assert_eq!(record.title.as_deref(), Some("Desk Lamp"));
        assert_eq!(record.price.as_deref(), Some("$24.99*"));
        assert_eq!(record.extracted_price, Some(24.99));
        assert_eq!(record.currency.as_deref(), Some("$"));
        assert_eq!(record.rating.as_deref(), Some("4.6"));
        assert_eq!(record.reviews.as_deref(), Some("1280"));
        assert_eq!(record.in_stock, Some(true));
        assert_eq!(record.condition.as_deref(), Some("New"));

        let lines = record.render_lines();
        assert!(lines.contains(&"Rating: 4.6/5".to_string()));
        assert!(lines.contains(&"In Stock: Yes".to_string()));
        assert!(lines.contains(&"Full Image: https://img.example/full.jpg".to_string()));
    }

    #[test]
    fn mistyped_fields_are_absent() {
        let item = VisualMatch::from_value(&json!({
            "title": ["not", "text"],
            "price": "12.00",
            "in_stock": "yes",
            "rating": null
        }));
        let record = extract_display_fields(&item);
        assert_eq!(record.title, None);
        assert_eq!(record.price, None);
        assert_eq!(record.in_stock, None);
        assert_eq!(record.rating, None);
    }

    #[test]
    fn extracted_value_accepts_numeric_strings() {
        let item = VisualMatch::from_value(&json!({
            "price": {"value": "$1,299.00", "extracted_value": "$1,299.00"}
        }));
        assert_eq!(extract_display_fields(&item).extracted_price, Some(1299.0));
    }
}
