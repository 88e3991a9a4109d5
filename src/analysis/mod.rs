// Analysis — descriptive statistics over a finished run.
//
// Deviation reports show which groups over- or under-use categories;
// classification places a new text between the human and generator profiles.

pub mod classify;
pub mod deviation;
