use metrics::register_schema_editor_counter;

register_schema_editor_counter!(pub BAD_REQUEST_ERROR_TOTAL, "Count of bad request errors");
register_schema_editor_counter!(pub UNAUTHENTICATED_ERROR_TOTAL, "Count of unauthenticated errors");
register_schema_editor_counter!(pub FORBIDDEN_ERROR_TOTAL, "Count of forbidden errors");
register_schema_editor_counter!(pub OVERLOADED_ERROR_TOTAL, "Count of overloaded errors");
