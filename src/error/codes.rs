/// Error code registry for minidp
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Recipe errors
/// - 3000-3999: Registry errors
/// - 4000-4999: Processor errors
/// - 5000-5999: Manifest errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_SAME_INPUT_OUTPUT: u16 = 1001;
    pub const CONFIG_INVALID_FILE: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Recipe errors (2000-2999)
    pub const RECIPE_GENERIC: u16 = 2000;
    pub const RECIPE_NOT_FOUND: u16 = 2001;
    pub const RECIPE_INVALID_JSON: u16 = 2002;
    pub const RECIPE_INVALID_YAML: u16 = 2003;
    pub const RECIPE_MISSING_FIELD: u16 = 2004;
    pub const RECIPE_INVALID_TYPE: u16 = 2005;
    pub const RECIPE_DUPLICATE_ID: u16 = 2006;
    pub const RECIPE_INVALID_SLICE: u16 = 2007;

    // Registry errors (3000-3999)
    pub const REGISTRY_GENERIC: u16 = 3000;
    pub const REGISTRY_NOT_FOUND: u16 = 3001;
    pub const REGISTRY_ALREADY_REGISTERED: u16 = 3002;
    pub const REGISTRY_PATH_NOT_FOUND: u16 = 3003;
    pub const REGISTRY_CONSTRUCTION_FAILED: u16 = 3004;

    // Processor errors (4000-4999)
    pub const PROCESSOR_GENERIC: u16 = 4000;
    pub const PROCESSOR_NO_OUTPUT: u16 = 4001;
    pub const PROCESSOR_RECORD_FAILED: u16 = 4002;
    pub const PROCESSOR_WORKER_FAILED: u16 = 4003;
    pub const PROCESSOR_STEP_FAILED: u16 = 4004;
    pub const PROCESSOR_HOOK_FAILED: u16 = 4005;

    // Manifest errors (5000-5999)
    pub const MANIFEST_GENERIC: u16 = 5000;
    pub const MANIFEST_READ_FAILED: u16 = 5001;
    pub const MANIFEST_WRITE_FAILED: u16 = 5002;
    pub const MANIFEST_INVALID_LINE: u16 = 5003;
    pub const MANIFEST_NOT_AN_OBJECT: u16 = 5004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Stage input and output manifests are the same path",
        1002 => "Configuration file could not be read or parsed",
        1003 => "Invalid value in configuration",

        2000 => "Generic recipe error",
        2001 => "Recipe file not found",
        2002 => "Invalid JSON syntax in recipe",
        2003 => "Invalid YAML syntax in recipe",
        2004 => "Required recipe field is missing",
        2005 => "Recipe field has the wrong type",
        2006 => "Duplicate step id in recipe",
        2007 => "Invalid steps_to_run selector",

        3000 => "Generic registry error",
        3001 => "Processor type is not registered",
        3002 => "Processor name is already registered",
        3003 => "No processor exported at qualified path",
        3004 => "Processor construction failed",

        4000 => "Generic processor error",
        4001 => "Processor has no output manifest",
        4002 => "Record transformation failed",
        4003 => "Parallel worker failed",
        4004 => "Pipeline step failed",
        4005 => "Processor lifecycle hook failed",

        5000 => "Generic manifest error",
        5001 => "Failed to read manifest",
        5002 => "Failed to write manifest",
        5003 => "Invalid JSON line in manifest",
        5004 => "Manifest line is not a JSON object",

        _ => "Unknown error code",
    }
}
