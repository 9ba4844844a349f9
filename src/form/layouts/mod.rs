//! Built-in layouts of the engineering change request forms.

pub mod change_request;
pub mod field_change_request;

use crate::form::layout::FormLayout;

/// Built-in layout by name.
pub fn by_name(name: &str) -> Option<FormLayout> {
    match name {
        change_request::NAME => Some(change_request::layout()),
        field_change_request::NAME => Some(field_change_request::layout()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("change_request").map(|layout| layout.sheet_index), Some(1));
        assert_eq!(by_name("field_change_request").map(|layout| layout.sheet_index), Some(3));
        assert!(by_name("unknown").is_none());
    }
}
