use std::{collections::HashMap, time::Duration};

use typed_builder::TypedBuilder;

use crate::sdam::ServerDescription;

/// Describes which server an operation should be dispatched to. The selection engine in the
/// topology layer recognizes the three variants; this crate only constructs and forwards them.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum SelectionCriteria {
    /// A read preference that should be used when selecting a server.
    ReadPreference(ReadPreference),

    /// The server that a prior operation in the same logical stream used. A cursor's `getMore`
    /// must reach the server holding the open cursor, but still traverses selection so that an
    /// unhealthy server triggers a monitor check.
    SameServer(ServerDescription),

    /// A server that can be written to under the secondary-writable rules, given the lowest wire
    /// version across the deployment at the time the operation began.
    #[non_exhaustive]
    SecondaryWritable {
        /// The lowest maximum wire version reported across the deployment.
        common_wire_version: i32,

        /// The read preference to fall back to when the deployment cannot accept secondary
        /// writes.
        read_preference: ReadPreference,
    },
}

impl SelectionCriteria {
    /// Selection by read preference.
    pub fn by_read_preference(read_preference: ReadPreference) -> Self {
        Self::ReadPreference(read_preference)
    }

    /// Selection anchored to a previously used server.
    pub fn same_server(description: ServerDescription) -> Self {
        Self::SameServer(description)
    }

    /// Selection of a secondary-writable server.
    pub fn secondary_writable(common_wire_version: i32, read_preference: ReadPreference) -> Self {
        Self::SecondaryWritable {
            common_wire_version,
            read_preference,
        }
    }

    /// The read preference this criteria carries, if any.
    pub fn as_read_pref(&self) -> Option<&ReadPreference> {
        match self {
            Self::ReadPreference(ref read_pref) => Some(read_pref),
            Self::SecondaryWritable {
                ref read_preference,
                ..
            } => Some(read_preference),
            Self::SameServer(_) => None,
        }
    }
}

impl From<ReadPreference> for SelectionCriteria {
    fn from(read_pref: ReadPreference) -> Self {
        Self::ReadPreference(read_pref)
    }
}

/// Specifies how the driver routes a read operation to members of a replica set.
///
/// If applicable, `tag_sets` can be used to target specific nodes in a cluster, and
/// `max_staleness` specifies the maximum lag behind the primary that a secondary can be to remain
/// eligible for the operation. The max staleness value maps to the `maxStalenessSeconds` field in
/// the selection algorithm; it must be at least 90 seconds.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ReadPreference {
    /// Only route this operation to the primary.
    Primary,

    /// Only route this operation to a secondary.
    #[non_exhaustive]
    Secondary {
        /// Specify tags and max staleness for the read preference.
        options: Option<ReadPreferenceOptions>,
    },

    /// Route this operation to the primary if it's available, but fall back to the secondaries if
    /// not.
    #[non_exhaustive]
    PrimaryPreferred {
        /// Specify tags and max staleness for the read preference.
        options: Option<ReadPreferenceOptions>,
    },

    /// Route this operation to a secondary if one is available, but fall back to the primary if
    /// not.
    #[non_exhaustive]
    SecondaryPreferred {
        /// Specify tags and max staleness for the read preference.
        options: Option<ReadPreferenceOptions>,
    },

    /// Route this operation to the node with the least network latency regardless of whether it's
    /// the primary or a secondary.
    #[non_exhaustive]
    Nearest {
        /// Specify tags and max staleness for the read preference.
        options: Option<ReadPreferenceOptions>,
    },
}

impl ReadPreference {
    /// A `PrimaryPreferred` read preference with default options.
    pub fn primary_preferred() -> Self {
        Self::PrimaryPreferred { options: None }
    }

    /// Whether this is the `Primary` read preference.
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }

    pub(crate) fn options(&self) -> Option<&ReadPreferenceOptions> {
        match self {
            Self::Primary => None,
            Self::Secondary { options }
            | Self::PrimaryPreferred { options }
            | Self::SecondaryPreferred { options }
            | Self::Nearest { options } => options.as_ref(),
        }
    }

    /// The maximum staleness specified for this read preference, if any.
    pub fn max_staleness(&self) -> Option<Duration> {
        self.options().and_then(|options| options.max_staleness)
    }

    /// The tag sets specified for this read preference, if any.
    pub fn tag_sets(&self) -> Option<&Vec<TagSet>> {
        self.options().and_then(|options| options.tag_sets.as_ref())
    }
}

/// Specifies read preference options for non-primary read preferences.
#[derive(Clone, Debug, Default, PartialEq, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ReadPreferenceOptions {
    /// Specifies which replica set members should be considered for operations. Each tag set will
    /// be checked in order until one or more servers is found with each tag in the set.
    pub tag_sets: Option<Vec<TagSet>>,

    /// Specifies the maximum amount of lag behind the primary that a secondary can have to be
    /// considered for the given operation. Secondaries lagging behind more than `max_staleness`
    /// will not be considered.
    pub max_staleness: Option<Duration>,
}

/// A read preference tag set, mapping replica set member tag names to required values.
pub type TagSet = HashMap<String, String>;
