use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(RecordKind {
    Scheduled => "scheduled",
    WalkIn => "walk_in",
    OnlineRegistration => "online_registration",
});

str_enum!(EntryStatus {
    Waiting => "waiting",
    Queued => "queued",
    InVisit => "in_visit",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Free => "free",
});

str_enum!(DiscountMode {
    None => "none",
    Benefit => "benefit",
    AllFree => "all_free",
});

str_enum!(ApprovalStatus {
    NotRequired => "not_required",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Where a department registration came from.
str_enum!(AssignmentSource {
    Online => "online",
    WalkIn => "walk_in",
    Desk => "desk",
});

impl RecordKind {
    /// Registration channel implied by the record kind.
    pub fn source(&self) -> AssignmentSource {
        match self {
            Self::OnlineRegistration => AssignmentSource::Online,
            Self::WalkIn => AssignmentSource::WalkIn,
            Self::Scheduled => AssignmentSource::Desk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_record_kind() {
        for kind in [
            RecordKind::Scheduled,
            RecordKind::WalkIn,
            RecordKind::OnlineRegistration,
        ] {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_value_is_invalid() {
        let err = "telepathy".parse::<PaymentStatus>().unwrap_err();
        assert!(matches!(err, ModelError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&RecordKind::OnlineRegistration).unwrap();
        assert_eq!(json, "\"online_registration\"");
    }

    #[test]
    fn record_kind_maps_to_source() {
        assert_eq!(RecordKind::Scheduled.source(), AssignmentSource::Desk);
        assert_eq!(RecordKind::WalkIn.source(), AssignmentSource::WalkIn);
        assert_eq!(
            RecordKind::OnlineRegistration.source(),
            AssignmentSource::Online
        );
    }
}
