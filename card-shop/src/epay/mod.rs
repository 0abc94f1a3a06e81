//! EPay gateway adapter
//!
//! Signs checkout requests and verifies payment notices. The signature is
//! MD5 over the sorted `k=v` pairs (without `sign`, `sign_type` and empty
//! values) followed by the merchant key, rendered as lowercase hex.

use std::collections::{BTreeMap, HashMap};

use md5::{Digest, Md5};
use shared::models::{Order, normalize_price};
use subtle::ConstantTimeEq;

use crate::config::Config;

/// `trade_status` of a successful payment
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";

fn digest<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>, key: &str) -> [u8; 16] {
    let sorted: BTreeMap<&str, &str> = params
        .into_iter()
        .filter(|(k, v)| !v.is_empty() && *k != "sign" && *k != "sign_type")
        .collect();
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Md5::new();
    hasher.update(joined.as_bytes());
    hasher.update(key.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Lowercase hex signature of `params`
pub fn sign<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>, key: &str) -> String {
    hex::encode(digest(params, key))
}

/// Verify the `sign` field of a gateway notice
pub fn verify(params: &HashMap<String, String>, key: &str) -> Result<(), &'static str> {
    let provided = params.get("sign").ok_or("Missing sign")?;
    let provided = hex::decode(provided.trim()).map_err(|_| "Invalid sign hex")?;
    let expected = digest(params.iter().map(|(k, v)| (k.as_str(), v.as_str())), key);

    if !bool::from(provided.as_slice().ct_eq(&expected[..])) {
        return Err("Sign mismatch");
    }
    Ok(())
}

/// Signed form fields sending the buyer to the gateway for `order`
pub fn checkout_params(order: &Order, config: &Config) -> Vec<(&'static str, String)> {
    let base = &config.public_base_url;
    let money = normalize_price(&order.amount).unwrap_or_else(|| order.amount.clone());

    let mut params = vec![
        ("pid", config.merchant_id.clone()),
        ("type", "epay".to_string()),
        ("out_trade_no", order.order_id.clone()),
        ("notify_url", format!("{base}/notify")),
        ("return_url", format!("{base}/callback/{}", order.order_id)),
        ("name", order.product_name.clone()),
        ("money", money),
        ("sign_type", "MD5".to_string()),
    ];
    let signature = sign(
        params.iter().map(|(k, v)| (*k, v.as_str())),
        &config.merchant_key,
    );
    params.push(("sign", signature));
    params
}

/// Page that auto-submits `params` to the gateway via POST
pub fn checkout_form(pay_url: &str, params: &[(&'static str, String)]) -> String {
    let inputs: String = params
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}">"#,
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE html><html><body onload="document.forms[0].submit()"><form action="{}" method="POST">{inputs}</form></body></html>"#,
        escape_html(pay_url)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fields of a verified notice that settlement needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotice {
    pub out_trade_no: String,
    pub trade_no: String,
    pub trade_status: String,
}

impl PaymentNotice {
    /// `None` when `out_trade_no` is missing, or when a success notice
    /// carries no `trade_no` (a paid order must stay refundable)
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        let field = |name: &str| params.get(name).map(|v| v.trim().to_string()).unwrap_or_default();
        let notice = Self {
            out_trade_no: field("out_trade_no"),
            trade_no: field("trade_no"),
            trade_status: field("trade_status"),
        };
        if notice.out_trade_no.is_empty() || (notice.is_success() && notice.trade_no.is_empty()) {
            return None;
        }
        Some(notice)
    }

    pub fn is_success(&self) -> bool {
        self.trade_status == TRADE_SUCCESS
    }
}
