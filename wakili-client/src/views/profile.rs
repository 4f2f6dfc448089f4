//! Profile panel rendering.

use super::format_date;
use wakili_core::UserProfile;

/// Display-ready profile panel content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub name: String,
    pub stats: String,
    pub last_active: String,
}

pub fn render_profile(profile: &UserProfile) -> ProfileView {
    ProfileView {
        name: profile.display_name().to_string(),
        stats: format!("{} documents generated", profile.document_count),
        last_active: format_date(profile.last_active_at()),
    }
}
