use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main response structure from the NSE option chain API.
/// Every field is optional: the feed drops keys freely when degraded, and a
/// field of the wrong shape is read as absent instead of failing the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionChain {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub records: Option<Records>,
}

/// Records section containing the underlying value and all strike data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Records {
    #[serde(
        rename = "underlyingValue",
        default,
        deserialize_with = "lenient::optional"
    )]
    pub underlying_value: Option<f64>,

    #[serde(default, deserialize_with = "lenient::entries")]
    pub data: Vec<OptionData>,
}

/// Option data for each strike price
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionData {
    #[serde(rename = "strikePrice", default, deserialize_with = "lenient::optional")]
    pub strike_price: Option<f64>,

    #[serde(rename = "CE", default, deserialize_with = "lenient::optional")]
    pub call: Option<OptionDetail>,

    #[serde(rename = "PE", default, deserialize_with = "lenient::optional")]
    pub put: Option<OptionDetail>,
}

/// Detailed option information (CE or PE)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionDetail {
    #[serde(rename = "openInterest", default, deserialize_with = "lenient::optional")]
    pub open_interest: Option<f64>,

    #[serde(
        rename = "changeinOpenInterest",
        default,
        deserialize_with = "lenient::optional"
    )]
    pub change_in_oi: Option<f64>,

    #[serde(
        rename = "totalTradedVolume",
        default,
        deserialize_with = "lenient::optional"
    )]
    pub total_traded_volume: Option<f64>,
}

impl OptionDetail {
    /// An empty `{}` side object carries no contract.
    pub fn is_empty(&self) -> bool {
        self.open_interest.is_none()
            && self.change_in_oi.is_none()
            && self.total_traded_volume.is_none()
    }
}

// -----------------------------------------------
// NORMALIZED ROWS
// -----------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Call => "CE",
            Side::Put => "PE",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of one strike, flattened out of the raw chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    pub side: Side,
    pub strike: i64,
    pub open_interest: f64,
    pub change_in_oi: f64,
    pub volume: f64,
    pub underlying: Option<f64>,
}

// -----------------------------------------------
// PUBLISHED STATE
// -----------------------------------------------

pub const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "BUY CE")]
    BuyCe,
    #[serde(rename = "BUY PE")]
    BuyPe,
    #[serde(rename = "NO TRADE")]
    NoTrade,
    #[serde(rename = "NO DATA")]
    NoData,
    #[serde(rename = "ERROR")]
    Error,
    Stopped,
    #[serde(rename = "Waiting…")]
    Waiting,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::BuyCe => "BUY CE",
            Signal::BuyPe => "BUY PE",
            Signal::NoTrade => "NO TRADE",
            Signal::NoData => "NO DATA",
            Signal::Error => "ERROR",
            Signal::Stopped => "Stopped",
            Signal::Waiting => "Waiting…",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document handed to readers. Replaced wholesale once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    #[serde(rename = "time")]
    pub timestamp: String,

    pub signal: Signal,

    #[serde(with = "placeholder")]
    pub atm: Option<i64>,

    #[serde(with = "placeholder")]
    pub pcr: Option<f64>,

    pub ce_votes: usize,
    pub pe_votes: usize,
    pub reasons: Vec<String>,
}

impl SignalState {
    pub fn waiting() -> Self {
        Self::blank(PLACEHOLDER.to_string(), Signal::Waiting, vec!["No data yet".to_string()])
    }

    pub fn stopped() -> Self {
        Self::blank(now_hms(), Signal::Stopped, vec!["Bot is stopped".to_string()])
    }

    pub fn fetch_failed(detail: &str) -> Self {
        Self::blank(
            now_hms(),
            Signal::NoData,
            vec!["Cannot fetch NSE data".to_string(), detail.to_string()],
        )
    }

    pub fn error(description: &str) -> Self {
        Self::blank(now_hms(), Signal::Error, vec![description.to_string()])
    }

    fn blank(timestamp: String, signal: Signal, reasons: Vec<String>) -> Self {
        Self {
            timestamp,
            signal,
            atm: None,
            pcr: None,
            ce_votes: 0,
            pe_votes: 0,
            reasons,
        }
    }
}

/// Wall-clock time of day, the resolution readers display.
pub fn now_hms() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Serializes `None` as the `"--"` placeholder and reads anything that is not
/// a `T` (the placeholder included) back as `None`.
mod placeholder {
    use super::PLACEHOLDER;
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(PLACEHOLDER),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Slot<T> {
            Value(T),
            Placeholder(IgnoredAny),
        }

        match Slot::<T>::deserialize(deserializer)? {
            Slot::Value(v) => Ok(Some(v)),
            Slot::Placeholder(_) => Ok(None),
        }
    }
}

/// Field readers for the NSE payload. A value of the wrong shape becomes
/// `None` (or a skipped entry) so one bad strike cannot sink the snapshot.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn optional<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).ok())
    }

    /// `null`, a non-array, or entries that are not objects all read as nothing.
    pub fn entries<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }
}
