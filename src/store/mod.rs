mod items;
mod prefs;

pub use items::FileCalendarHost;
pub use prefs::FilePreferenceStore;
