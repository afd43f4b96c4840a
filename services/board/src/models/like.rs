//! Like toggling outcome

/// What a toggle did to the (post, user) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Added,
    Removed,
}

impl LikeToggle {
    pub fn liked(self) -> bool {
        matches!(self, LikeToggle::Added)
    }

    pub fn message(self) -> &'static str {
        match self {
            LikeToggle::Added => "Like added",
            LikeToggle::Removed => "Like removed",
        }
    }
}
