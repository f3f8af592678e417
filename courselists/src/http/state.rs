use std::sync::Arc;

use crate::canvas::CourseApi;
use crate::mailing_list::ListStore;

#[derive(Clone)]
pub struct AppState {
    pub courses: Arc<dyn CourseApi>,
    pub lists: ListStore,
    /// Domain new mailing lists are created under.
    pub list_domain: String,
}
