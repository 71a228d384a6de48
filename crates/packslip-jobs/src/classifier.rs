//! Page classifier: derives `(order_id, item_id)` for each page of a slip document.
//!
//! Packing slips routinely omit the order header and item table on
//! continuation pages, so classification threads a [`CarryState`] through the
//! document in page order. A page without its own markers inherits the
//! identifiers of the page before it.

use regex::Regex;
use tracing::{trace, warn};

use packslip_core::defaults::{
    BARCODE_MAX_DIGITS, BARCODE_MIN_DIGITS, ORDER_LABEL, PRODUCT_HEADER, SKU_HEADER,
    UNKNOWN_ITEM_PREFIX,
};
use packslip_core::{sanitize_item_id, Error, PageRecord, Result};

/// Configuration for page classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Literal label that precedes the order number.
    pub order_label: String,
    /// Product column header token of the item table.
    pub product_header: String,
    /// Item-code column header token of the item table.
    pub sku_header: String,
    /// Shortest digit run treated as a tracking barcode.
    pub barcode_min_digits: usize,
    /// Longest digit run treated as a tracking barcode.
    pub barcode_max_digits: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            order_label: ORDER_LABEL.to_string(),
            product_header: PRODUCT_HEADER.to_string(),
            sku_header: SKU_HEADER.to_string(),
            barcode_min_digits: BARCODE_MIN_DIGITS,
            barcode_max_digits: BARCODE_MAX_DIGITS,
        }
    }
}

impl ClassifierConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PACKSLIP_ORDER_LABEL` | `Order ID:` | Label preceding the order digits |
    /// | `PACKSLIP_PRODUCT_HEADER` | `Product Name` | Product column header |
    /// | `PACKSLIP_SKU_HEADER` | `Seller SKU` | Item-code column header |
    /// | `PACKSLIP_BARCODE_MIN_DIGITS` | `10` | Barcode minimum length |
    /// | `PACKSLIP_BARCODE_MAX_DIGITS` | `18` | Barcode maximum length |
    pub fn from_env() -> Self {
        let default = Self::default();

        let barcode_min_digits = std::env::var("PACKSLIP_BARCODE_MIN_DIGITS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.barcode_min_digits)
            .max(1);

        let barcode_max_digits = std::env::var("PACKSLIP_BARCODE_MAX_DIGITS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.barcode_max_digits)
            .max(barcode_min_digits);

        Self {
            order_label: std::env::var("PACKSLIP_ORDER_LABEL").unwrap_or(default.order_label),
            product_header: std::env::var("PACKSLIP_PRODUCT_HEADER")
                .unwrap_or(default.product_header),
            sku_header: std::env::var("PACKSLIP_SKU_HEADER").unwrap_or(default.sku_header),
            barcode_min_digits,
            barcode_max_digits,
        }
    }

    /// Set the order label.
    pub fn with_order_label(mut self, label: impl Into<String>) -> Self {
        self.order_label = label.into();
        self
    }

    /// Set both item table header tokens.
    pub fn with_headers(mut self, product: impl Into<String>, sku: impl Into<String>) -> Self {
        self.product_header = product.into();
        self.sku_header = sku.into();
        self
    }

    /// Set the barcode digit range.
    pub fn with_barcode_digits(mut self, min: usize, max: usize) -> Self {
        self.barcode_min_digits = min;
        self.barcode_max_digits = max;
        self
    }
}

/// Identifiers carried from one page to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarryState {
    pub last_order_id: Option<String>,
    pub last_item_id: Option<String>,
}

/// Regex/heuristic page classifier.
#[derive(Debug, Clone)]
pub struct PageClassifier {
    config: ClassifierConfig,
    order_re: Regex,
    barcode_re: Regex,
}

impl PageClassifier {
    /// Compile the patterns described by `config`.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        if config.order_label.trim().is_empty() {
            return Err(Error::Config("order label must not be empty".to_string()));
        }
        if config.barcode_min_digits == 0 || config.barcode_min_digits > config.barcode_max_digits
        {
            return Err(Error::Config(format!(
                "invalid barcode digit range {}..={}",
                config.barcode_min_digits, config.barcode_max_digits
            )));
        }

        let order_re = Regex::new(&format!(r"{}\s*(\d+)", regex::escape(&config.order_label)))
            .map_err(|e| Error::Config(format!("order pattern: {}", e)))?;
        let barcode_re = Regex::new(&format!(
            r"\b\d{{{},{}}}\b",
            config.barcode_min_digits, config.barcode_max_digits
        ))
        .map_err(|e| Error::Config(format!("barcode pattern: {}", e)))?;

        Ok(Self {
            config,
            order_re,
            barcode_re,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Order number following the order label, if present.
    pub fn extract_order_id(&self, text: &str) -> Option<String> {
        self.order_re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Whether the page carries a tracking barcode (a new item starts here).
    pub fn has_barcode(&self, text: &str) -> bool {
        self.barcode_re.is_match(text)
    }

    /// Item code from the row under the first item table header.
    ///
    /// Only the first header line is considered. The item code is the
    /// second-to-last whitespace token of the following line.
    pub fn extract_item_id(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        let header = lines.iter().position(|line| {
            line.contains(self.config.product_header.as_str())
                && line.contains(self.config.sku_header.as_str())
        })?;

        let row = lines.get(header + 1)?;
        let tokens: Vec<&str> = row.split_whitespace().collect();
        if tokens.len() < 2 {
            return None;
        }
        Some(tokens[tokens.len() - 2].to_string())
    }

    /// Classify one page given the state carried from the previous page.
    pub fn classify(
        &self,
        page_index: usize,
        text: &str,
        carry: &CarryState,
    ) -> (PageRecord, CarryState) {
        let mut next = carry.clone();

        let order_id = match self.extract_order_id(text) {
            Some(order) => {
                next.last_order_id = Some(order.clone());
                Some(order)
            }
            None => carry.last_order_id.clone(),
        };

        // No barcode on a continuation page: keep the previous item as is.
        let extracted = match (&carry.last_item_id, self.has_barcode(text)) {
            (Some(last), false) => Some(last.clone()),
            _ => self.extract_item_id(text),
        };

        let item_id = extracted
            .map(|item| sanitize_item_id(&item))
            .filter(|item| !item.is_empty())
            .or_else(|| carry.last_item_id.clone())
            .unwrap_or_else(|| format!("{}{}", UNKNOWN_ITEM_PREFIX, page_index));
        next.last_item_id = Some(item_id.clone());

        let order_id = order_id.filter(|o| !o.is_empty());
        if order_id.is_none() {
            warn!(page_index, item_id = %item_id, "Missing order id, page will not be grouped");
        } else {
            trace!(page_index, order_id = ?order_id, item_id = %item_id, "Classified page");
        }

        (
            PageRecord {
                page_index,
                order_id,
                item_id,
            },
            next,
        )
    }

    /// Classify a whole document given as per-page texts, in order.
    pub fn classify_all<'a, I>(&self, pages: I) -> Vec<PageRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut carry = CarryState::default();
        pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let (record, next) = self.classify(index, text, &carry);
                carry = next;
                record
            })
            .collect()
    }
}
