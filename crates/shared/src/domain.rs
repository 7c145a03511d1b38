use std::fmt;

use serde::{Deserialize, Serialize};

const RIDES_ROOT: &str = "requests";
const OFFERS_CHILD: &str = "offers";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(RideId);
id_newtype!(DriverId);

impl RideId {
    /// Random identifier for rides created locally (demo runs, fixtures).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Store path of the ride record, `requests/{rideId}`.
    pub fn record_path(&self) -> String {
        format!("{RIDES_ROOT}/{}", self.0)
    }

    /// Store path of a single offer, `requests/{rideId}/offers/{driverId}`.
    pub fn offer_path(&self, driver_id: &DriverId) -> String {
        format!("{RIDES_ROOT}/{}/{OFFERS_CHILD}/{}", self.0, driver_id.0)
    }
}
