//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use slidesmith_core::job::TerminalOutcome;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Project lifecycle status.
    ProjectStatus {
        Draft = 1,
        OutlineGenerated = 2,
        DescriptionsGenerated = 3,
        Completed = 4,
    }
}

define_status_enum! {
    /// Generation unit (page) status.
    PageStatus {
        Draft = 1,
        DescriptionGenerated = 2,
        Generating = 3,
        Completed = 4,
        Failed = 5,
    }
}

define_status_enum! {
    /// Background task status.
    TaskStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Partial = 4,
        Failed = 5,
    }
}

impl TaskStatus {
    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Partial | TaskStatus::Failed
        )
    }
}

impl From<TerminalOutcome> for TaskStatus {
    fn from(outcome: TerminalOutcome) -> Self {
        match outcome {
            TerminalOutcome::Completed => TaskStatus::Completed,
            TerminalOutcome::Partial => TaskStatus::Partial,
            TerminalOutcome::Failed => TaskStatus::Failed,
        }
    }
}
