use chrono::{DateTime, Utc};
use fake::faker::address::en::CityName;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use lodestore::datastore::Datastore;
use lodestore::datastore_builder::DatastoreBuilder;
use lodestore::doc;
use lodestore::document::Document;
use lodestore::errors::LodeResult;
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread to avoid thread exhaustion when running many tests in parallel.
pub fn run_test<T, B, A>(before: B, test: T, after: A) -> ()
where
    T: Fn(TestContext) -> LodeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> LodeResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> LodeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx.clone()) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx.clone());
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };

                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());

                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Panic: {}", err_msg);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    db: Datastore,
}

impl TestContext {
    pub fn new(path: PathBuf, db: Datastore) -> Self {
        Self { path, db }
    }

    /// The datafile backing [TestContext::db].
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn db(&self) -> Datastore {
        self.db.clone()
    }

    /// Closes the datastore and opens a new one on the same datafile.
    pub fn reopen(&self) -> LodeResult<TestContext> {
        self.db.close()?;
        let db = DatastoreBuilder::default()
            .filename(&self.path)
            .autoload(true)
            .open()?;
        Ok(TestContext::new(self.path.clone(), db))
    }

    /// Lines currently in the datafile.
    pub fn datafile_lines(&self) -> Vec<String> {
        read_lines(&self.path)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("{}.db", id))
}

/// A file backed datastore on a fresh datafile, loaded on open.
pub fn create_test_context() -> LodeResult<TestContext> {
    let path = random_path();
    if path.exists() {
        let _ = fs::remove_file(&path);
    }

    let db = DatastoreBuilder::default()
        .filename(&path)
        .autoload(true)
        .open()?;
    Ok(TestContext::new(path, db))
}

pub fn create_memory_test_context() -> LodeResult<TestContext> {
    let db = DatastoreBuilder::default().in_memory().open()?;
    Ok(TestContext::new(random_path(), db))
}

pub fn cleanup(ctx: TestContext) -> LodeResult<()> {
    if let Err(e) = ctx.db().close() {
        eprintln!("Warning: Failed to close datastore: {:?}", e);
    }

    let mut temp = ctx.path().as_os_str().to_owned();
    temp.push("~");
    for path in [ctx.path().to_path_buf(), PathBuf::from(temp)] {
        match fs::remove_file(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => eprintln!("Warning: Failed to remove {:?}: {:?}", path, e),
        }
    }
    Ok(())
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_date(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

pub fn create_test_docs() -> Vec<Document> {
    let doc1 = doc! {
        first_name: "fn1",
        last_name: "ln1",
        birth_day: (parse_date("2012-07-01T02:15:22+02:00")),
        arr: [1, 2, 3],
        list: ["one", "two", "three"],
        body: "a quick brown fox jump over the lazy dog",
    };

    let doc2 = doc! {
        first_name: "fn2",
        last_name: "ln2",
        birth_day: (parse_date("2010-06-12T12:05:35+05:30")),
        arr: [3, 4, 3],
        list: ["three", "four", "five"],
        body: "quick hello world from lodestore",
    };

    let doc3 = doc! {
        first_name: "fn3",
        last_name: "ln2",
        birth_day: (parse_date("2014-04-17T22:25:44-04:00")),
        arr: [9, 4, 8],
        body: "Lorem ipsum dolor sit amet, consectetur \
        adipiscing elit. Sed nunc mi, mattis ullamcorper \
        dignissim vitae, condimentum non lorem.",
    };

    vec![doc1, doc2, doc3]
}

pub fn insert_test_documents(db: &Datastore) -> LodeResult<Vec<Document>> {
    db.insert_many(create_test_docs())
}

/// A person with random names living in a random city.
pub fn random_person(age: i64) -> Document {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let city: String = CityName().fake();
    doc! {
        first_name: first_name,
        last_name: last_name,
        age: age,
        address: { city: city },
    }
}

pub fn string_field(doc: &Document, path: &str) -> String {
    doc.get_path(path)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn int_field(doc: &Document, path: &str) -> i64 {
    doc.get_path(path).and_then(|v| v.as_i64()).unwrap_or(i64::MIN)
}

pub fn is_sorted<T: Ord>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let mut iter = iterable.into_iter();
    if let Some(mut prev) = iter.next() {
        for current in iter {
            if ascending {
                if prev > current {
                    return false;
                }
            } else if prev < current {
                return false;
            }
            prev = current;
        }
    }
    true
}
