use serde::{Deserialize, Serialize};

/// Placeholder first name used when the buyer has not identified themselves;
/// the provider's own interactive flow collects the real identity.
pub const FALLBACK_FIRST_NAME: &str = "Online";
pub const FALLBACK_LAST_NAME: &str = "Customer";

/// The merchant's registered address, substituted verbatim for billing and
/// shipping when no complete customer record is available.
pub const FALLBACK_ADDRESS: FallbackAddress = FallbackAddress {
    line1: "821 NE 79th St",
    city: "Miami",
    state: "FL",
    zip_code: "33138",
    country: "US",
};

#[derive(Debug, Clone, Copy)]
pub struct FallbackAddress {
    pub line1: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub zip_code: &'static str,
    pub country: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// Buyer identity collected by the storefront, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Customer {
    /// Whether every field the provider requires is present and non-blank.
    ///
    /// Incomplete records are not merged with fallback values field by field;
    /// the checkout payload either carries the customer verbatim or the
    /// fallback identity verbatim.
    pub fn is_complete(&self) -> bool {
        present(&self.first_name)
            && present(&self.last_name)
            && present(&self.email)
            && present(&self.phone)
            && present(&self.address.line1)
            && present(&self.address.city)
            && present(&self.address.state)
            && present(&self.address.zip_code)
    }
}
