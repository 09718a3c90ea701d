//! Maps a validated cart snapshot into the financing provider's checkout
//! wire schema.

use chrono::Utc;
use paylane_types::{
    CartLineItem, CartSnapshot, CheckoutItem, CheckoutMetadata, CheckoutRequest, ContactAddress,
    ContactBlock, Customer, GatewayConfig, MerchantBlock, PersonName, FALLBACK_ADDRESS,
    FALLBACK_FIRST_NAME, FALLBACK_LAST_NAME,
};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Provider caps for item display names and SKUs.
pub const MAX_DISPLAY_NAME_LEN: usize = 120;
pub const MAX_SKU_LEN: usize = 64;

/// Build the provider checkout object from a snapshot.
///
/// The total is always recomputed from the mapped item list; a caller-held
/// total can drift from the items it claims to describe (e.g. after rows are
/// filtered) and the provider rejects mismatches.
pub fn build_checkout(
    snapshot: &CartSnapshot,
    customer: Option<&Customer>,
    config: &GatewayConfig,
) -> CheckoutRequest {
    let origin = &config.merchant_origin;

    let items: Vec<CheckoutItem> = snapshot
        .items()
        .iter()
        .map(|item| map_item(item, origin))
        .collect();

    let subtotal: i64 = items.iter().map(|it| it.unit_price * it.qty).sum();
    let total = subtotal + snapshot.shipping_minor() + snapshot.tax_minor();

    let contact = contact_block(customer);
    let order_id = next_order_id();
    debug!(order_id = %order_id, total, items = items.len(), "built checkout payload");

    CheckoutRequest {
        merchant: MerchantBlock {
            user_confirmation_url: join_origin(origin, "/affirm/confirm"),
            user_cancel_url: join_origin(origin, "/affirm/cancel"),
            user_confirmation_url_action: "GET".to_string(),
            name: config.merchant_name.clone(),
        },
        billing: contact.clone(),
        shipping: contact,
        items,
        currency: "USD".to_string(),
        shipping_amount: snapshot.shipping_minor(),
        tax_amount: snapshot.tax_minor(),
        total,
        order_id,
        metadata: CheckoutMetadata {
            mode: "modal".to_string(),
        },
    }
}

/// Fresh order id per attempt. Retries of the same logical purchase must not
/// reuse an id a previous failed attempt already registered with the provider,
/// so a uuid fragment backs up the millisecond timestamp.
pub fn next_order_id() -> String {
    let fragment = Uuid::new_v4().simple().to_string();
    format!(
        "ORDER-{}-{}",
        Utc::now().timestamp_millis(),
        &fragment[..8]
    )
}

fn map_item(item: &CartLineItem, origin: &Url) -> CheckoutItem {
    CheckoutItem {
        display_name: truncate(item.name.trim(), MAX_DISPLAY_NAME_LEN),
        sku: sanitize_sku(&item.id),
        unit_price: item.unit_price_minor,
        qty: item.quantity,
        item_url: resolve_url(item.url.as_deref(), origin)
            .unwrap_or_else(|| origin.to_string()),
        item_image_url: resolve_url(item.image_url.as_deref(), origin),
    }
}

/// Collapse whitespace runs to `-` and truncate to the provider's SKU cap.
fn sanitize_sku(id: &str) -> String {
    let collapsed: String = id
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    truncate(&collapsed, MAX_SKU_LEN)
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Resolve a possibly relative URL against the merchant origin. The provider
/// schema rejects relative URLs, so anything unresolvable is omitted.
fn resolve_url(candidate: Option<&str>, origin: &Url) -> Option<String> {
    let candidate = candidate?.trim();
    if candidate.is_empty() {
        return None;
    }
    origin.join(candidate).ok().map(|u| u.to_string())
}

fn join_origin(origin: &Url, path: &str) -> String {
    origin
        .join(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{origin}{}", path.trim_start_matches('/')))
}

fn contact_block(customer: Option<&Customer>) -> ContactBlock {
    match customer {
        Some(c) if c.is_complete() => ContactBlock {
            name: PersonName {
                first: c.first_name.clone().unwrap_or_default().trim().to_string(),
                last: c.last_name.clone().unwrap_or_default().trim().to_string(),
            },
            address: ContactAddress {
                line1: c.address.line1.clone().unwrap_or_default().trim().to_string(),
                line2: c
                    .address
                    .line2
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                city: c.address.city.clone().unwrap_or_default().trim().to_string(),
                state: c.address.state.clone().unwrap_or_default().trim().to_string(),
                zipcode: c
                    .address
                    .zip_code
                    .clone()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                country: c
                    .address
                    .country
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .unwrap_or("US")
                    .to_string(),
            },
            email: c.email.clone(),
            phone_number: c.phone.clone(),
        },
        _ => fallback_contact(),
    }
}

/// The designated fallback identity; the provider's interactive flow collects
/// the real buyer identity in this case.
fn fallback_contact() -> ContactBlock {
    ContactBlock {
        name: PersonName {
            first: FALLBACK_FIRST_NAME.to_string(),
            last: FALLBACK_LAST_NAME.to_string(),
        },
        address: ContactAddress {
            line1: FALLBACK_ADDRESS.line1.to_string(),
            line2: None,
            city: FALLBACK_ADDRESS.city.to_string(),
            state: FALLBACK_ADDRESS.state.to_string(),
            zipcode: FALLBACK_ADDRESS.zip_code.to_string(),
            country: FALLBACK_ADDRESS.country.to_string(),
        },
        email: None,
        phone_number: None,
    }
}
