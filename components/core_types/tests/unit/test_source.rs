//! Unit tests for StackFrame

use core_types::StackFrame;

#[cfg(test)]
mod stack_frame_tests {
    use super::*;

    #[test]
    fn test_capture_records_the_calling_file() {
        let frame = StackFrame::capture("lift");
        assert_eq!(frame.function_name.as_deref(), Some("lift"));
        assert!(frame.source_url.unwrap().ends_with("test_source.rs"));
    }

    #[test]
    fn test_capture_records_line_and_column() {
        let line = line!() + 1;
        let frame = StackFrame::capture("then");
        assert_eq!(frame.line, line);
        assert!(frame.column > 0);
    }

    #[test]
    fn test_from_location() {
        let location = std::panic::Location::caller();
        let frame = StackFrame::from_location("defer", location);
        assert_eq!(frame.line, location.line());
        assert_eq!(frame.column, location.column());
    }

    #[test]
    fn test_display_with_source() {
        let frame = StackFrame {
            function_name: Some("reject".to_string()),
            source_url: Some("src/app.rs".to_string()),
            line: 12,
            column: 5,
        };
        assert_eq!(frame.to_string(), "at reject (src/app.rs:12:5)");
    }

    #[test]
    fn test_display_anonymous_without_source() {
        let frame = StackFrame {
            function_name: None,
            source_url: None,
            line: 0,
            column: 0,
        };
        assert_eq!(frame.to_string(), "at <anonymous>");
    }
}
