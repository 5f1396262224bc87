//! Domain enumerations.
//!
//! All enums are persisted as VARCHAR using their variant name and travel
//! over JSON with the same spelling.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[sqlx(type_name = "VARCHAR")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Variant names in declaration order.
            pub const NAMES: &'static [&'static str] = &[$(stringify!($variant)),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        crate::Error::InvalidArgument(format!(
                            "Unknown {} value: {}",
                            stringify!($name),
                            s
                        ))
                    })
            }
        }
    };
}

text_enum! {
    /// Role carried in the access token.
    pub enum Role {
        TechAdmin,
        MinistryAdmin,
        RegionAdmin,
        AreaAdmin,
        Provider,
        Parent,
    }
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Role::TechAdmin | Role::MinistryAdmin | Role::RegionAdmin | Role::AreaAdmin
        )
    }
}

text_enum! {
    /// Refinement of the provider role for provider staff accounts.
    pub enum Subrole {
        None,
        ProviderDeputy,
        ProviderAdmin,
    }
}

impl Default for Subrole {
    fn default() -> Self {
        Subrole::None
    }
}

text_enum! {
    pub enum Gender {
        Male,
        Female,
    }
}

text_enum! {
    pub enum ApplicationStatus {
        Pending,
        AcceptedForSelection,
        Approved,
        StudyingForYears,
        Completed,
        Rejected,
        Left,
    }
}

impl ApplicationStatus {
    /// Statuses that occupy a seat in the workshop.
    pub const VALID: &'static [ApplicationStatus] =
        &[ApplicationStatus::Approved, ApplicationStatus::StudyingForYears];

    /// Statuses that block a new application for the same child and workshop.
    pub const ACTIVE: &'static [ApplicationStatus] = &[
        ApplicationStatus::Pending,
        ApplicationStatus::AcceptedForSelection,
        ApplicationStatus::Approved,
        ApplicationStatus::StudyingForYears,
    ];

    /// Statuses that allow a parent to leave a review.
    pub const REVIEWABLE: &'static [ApplicationStatus] = &[
        ApplicationStatus::Approved,
        ApplicationStatus::StudyingForYears,
        ApplicationStatus::Completed,
    ];

    pub fn is_valid(&self) -> bool {
        Self::VALID.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Rejected | ApplicationStatus::Left
        )
    }
}

text_enum! {
    pub enum ProviderStatus {
        Pending,
        Editing,
        Approved,
        Recheck,
    }
}

text_enum! {
    pub enum LicenseStatus {
        NotProvided,
        Pending,
        Approved,
    }
}

text_enum! {
    pub enum OwnershipType {
        State,
        Common,
        Private,
    }
}

text_enum! {
    pub enum WorkshopStatus {
        Open,
        Closed,
    }
}

text_enum! {
    pub enum NotificationType {
        System,
        Parent,
        Provider,
        Workshop,
        Application,
        Chat,
    }
}

text_enum! {
    pub enum NotificationAction {
        Create,
        Update,
        Delete,
        Block,
        Unblock,
        Message,
        LicenseApprove,
        ProviderStatusChange,
    }
}

text_enum! {
    /// CATOTTG category codes.
    pub enum CodeficatorCategory {
        /// Region (oblast) or the Autonomous Republic of Crimea.
        O,
        /// City with special status.
        K,
        /// District (raion).
        P,
        /// Territorial community (hromada).
        H,
        /// City.
        M,
        /// Urban-type settlement.
        T,
        /// Village.
        C,
        /// Settlement.
        X,
        /// City district.
        B,
    }
}

impl CodeficatorCategory {
    /// Top-level entries returned when no parent is requested.
    pub const LEVEL1: &'static [CodeficatorCategory] =
        &[CodeficatorCategory::O, CodeficatorCategory::K];

    /// Settlement-level entries used for address lookups.
    pub const SETTLEMENTS: &'static [CodeficatorCategory] = &[
        CodeficatorCategory::K,
        CodeficatorCategory::M,
        CodeficatorCategory::T,
        CodeficatorCategory::C,
        CodeficatorCategory::X,
    ];
}

text_enum! {
    pub enum SyncOperation {
        Create,
        Update,
        Delete,
    }
}

text_enum! {
    pub enum SyncEntity {
        Workshop,
    }
}

text_enum! {
    pub enum ChangesLogEntity {
        Provider,
        Application,
    }
}

text_enum! {
    pub enum AdminKind {
        Ministry,
        Region,
        Area,
    }
}

impl AdminKind {
    pub fn role(&self) -> Role {
        match self {
            AdminKind::Ministry => Role::MinistryAdmin,
            AdminKind::Region => Role::RegionAdmin,
            AdminKind::Area => Role::AreaAdmin,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            AdminKind::Ministry => "ministry_admins",
            AdminKind::Region => "region_admins",
            AdminKind::Area => "area_admins",
        }
    }

    /// Path segment used by the identity server for this admin kind.
    pub fn identity_segment(&self) -> &'static str {
        match self {
            AdminKind::Ministry => "ministryadmin",
            AdminKind::Region => "regionadmin",
            AdminKind::Area => "areaadmin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Which applications to include with regard to provider blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShowApplications {
    #[default]
    All,
    Blocked,
    Unblocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "approved".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Approved
        );
        assert_eq!("TechAdmin".parse::<Role>().unwrap(), Role::TechAdmin);
        assert!("nope".parse::<Role>().is_err());
    }

    #[test]
    fn status_groups() {
        assert!(ApplicationStatus::Approved.is_valid());
        assert!(ApplicationStatus::StudyingForYears.is_valid());
        assert!(!ApplicationStatus::Pending.is_valid());
        assert!(ApplicationStatus::ACTIVE.contains(&ApplicationStatus::AcceptedForSelection));
        assert!(ApplicationStatus::Left.is_terminal());
    }

    #[test]
    fn admin_roles() {
        assert!(Role::AreaAdmin.is_admin());
        assert!(!Role::Provider.is_admin());
        assert_eq!(AdminKind::Region.role(), Role::RegionAdmin);
    }

    #[test]
    fn documented_variants_keep_names_and_order() {
        assert_eq!("m".parse::<CodeficatorCategory>().unwrap(), CodeficatorCategory::M);
        assert_eq!(CodeficatorCategory::B.as_str(), "B");
        assert_eq!(CodeficatorCategory::NAMES[0], "O");
        assert_eq!(ApplicationStatus::NAMES.first(), Some(&"Pending"));
        assert_eq!(ProviderStatus::NAMES, &["Pending", "Editing", "Approved", "Recheck"]);
    }
}
