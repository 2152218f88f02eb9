use std::time::Duration;

// doc constants
pub const DOC_ID: &str = "_id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const GENERATED_ID_LENGTH: usize = 16;
pub const FIELD_SEPARATOR: char = '.';
pub const OPERATOR_PREFIX: char = '$';

// log line tags
pub const DATE_TAG: &str = "$$date";
pub const DELETED_TAG: &str = "$$deleted";
pub const INDEX_CREATED_TAG: &str = "$$indexCreated";
pub const INDEX_REMOVED_TAG: &str = "$$indexRemoved";

// index metadata keys
pub const INDEX_FIELD_NAME: &str = "fieldName";
pub const INDEX_UNIQUE: &str = "unique";
pub const INDEX_SPARSE: &str = "sparse";
pub const INDEX_EXPIRE_AFTER: &str = "expireAfterSeconds";
pub const INDEX_NAME_SEPARATOR: char = ',';

// store constants
pub const TEMP_FILE_SUFFIX: &str = "~";
pub const MIN_AUTOCOMPACTION_INTERVAL: Duration = Duration::from_secs(5);
pub const SERIALIZATION_HOOK_PROBES: usize = 10;

// event constants
pub const DATASTORE_EVENT: &str = "datastore_event";
