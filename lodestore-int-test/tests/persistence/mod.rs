mod compaction_test;
mod load_test;
mod serialization_hook_test;
