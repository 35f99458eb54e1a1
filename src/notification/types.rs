use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as, DisplayFromStr};

use crate::lorawan::{DevAddr, Eui64};

/// Kind of device event, also the last segment of the broker topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Uplink data
    Rx,
    /// Device joined the network
    Join,
    /// Confirmed downlink acknowledged (or not)
    Ack,
    /// Processing error for the device
    Error,
}

impl EventType {
    pub const ALL: [EventType; 4] = [EventType::Rx, EventType::Join, EventType::Ack, EventType::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Rx => "rx",
            EventType::Join => "join",
            EventType::Ack => "ack",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device-originated notification scoped to one application and device.
pub trait Notification: Serialize + Send + Sync {
    const EVENT: EventType;

    fn application_id(&self) -> i64;

    fn dev_eui(&self) -> Eui64;
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Gateway reception metadata for an uplink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RxInfo {
    pub mac: Eui64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rssi: i32,
    #[serde(rename = "loRaSNR", default)]
    pub lora_snr: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRate {
    #[serde(default)]
    pub modulation: String,
    #[serde(default)]
    pub bandwidth: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub spread_factor: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bitrate: u32,
}

/// Transmission parameters of an uplink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInfo {
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub data_rate: DataRate,
    #[serde(default)]
    pub adr: bool,
    #[serde(default)]
    pub code_rate: String,
}

/// Uplink data received from a device
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUpPayload {
    #[serde(rename = "applicationID")]
    #[serde_as(as = "DisplayFromStr")]
    pub application_id: i64,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(rename = "devEUI")]
    pub dev_eui: Eui64,
    #[serde(default)]
    pub rx_info: Vec<RxInfo>,
    #[serde(default)]
    pub tx_info: TxInfo,
    #[serde(default)]
    pub f_cnt: u32,
    #[serde(default)]
    pub f_port: u8,
    #[serde(default)]
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

/// Device completed an OTAA join
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinNotification {
    #[serde(rename = "applicationID")]
    #[serde_as(as = "DisplayFromStr")]
    pub application_id: i64,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(rename = "devEUI")]
    pub dev_eui: Eui64,
    #[serde(default)]
    pub dev_addr: DevAddr,
}

/// Outcome of a confirmed downlink
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckNotification {
    #[serde(rename = "applicationID")]
    #[serde_as(as = "DisplayFromStr")]
    pub application_id: i64,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(rename = "devEUI")]
    pub dev_eui: Eui64,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub f_cnt: u32,
}

/// Error raised while handling a device frame
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotification {
    #[serde(rename = "applicationID")]
    #[serde_as(as = "DisplayFromStr")]
    pub application_id: i64,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(rename = "devEUI")]
    pub dev_eui: Eui64,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub f_cnt: u32,
}

macro_rules! impl_notification {
    ($ty:ty, $event:expr) => {
        impl Notification for $ty {
            const EVENT: EventType = $event;

            fn application_id(&self) -> i64 {
                self.application_id
            }

            fn dev_eui(&self) -> Eui64 {
                self.dev_eui
            }
        }
    };
}

impl_notification!(DataUpPayload, EventType::Rx);
impl_notification!(JoinNotification, EventType::Join);
impl_notification!(AckNotification, EventType::Ack);
impl_notification!(ErrorNotification, EventType::Error);
