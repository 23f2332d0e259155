use crate::*;
use std::str::FromStr;

#[test]
fn loglevels() {
    macro_rules! test_conv {
        ($level:ident, $str1:literal, $str2:literal, $str3:literal) => {
            assert_eq!(Ok(LogLevel::$level), LogLevel::from_str($str1));
            assert_eq!(Ok(LogLevel::$level), LogLevel::from_str($str2));
            assert_eq!(Ok(LogLevel::$level), LogLevel::from_str($str3));
            assert_eq!(format!("{}", LogLevel::$level), $str2);
            assert_eq!(LogLevel::$level.name(), $str2);
        };
    }

    test_conv!(Trace, "trace", "TRACE", "Trace");
    test_conv!(Debug, "debug", "DEBUG", "Debug");
    test_conv!(Info, "info", "INFO", "Info");
    test_conv!(Warn, "warn", "WARN", "Warn");
    test_conv!(Error, "error", "ERROR", "Error");
    test_conv!(Off, "off", "OFF", "Off");
    test_conv!(Open, "open", "OPEN", "Open");
    test_conv!(Close, "close", "CLOSE", "Close");

    assert_eq!(Err(LogLevelError), LogLevel::from_str("zzzzz"));
    assert_eq!(Ok(LogLevel::Warn), LogLevel::from_str(" warn "));
    assert_eq!(format!("{}", LogLevelError), "invalid logging level");

    for level in LogLevel::all_levels() {
        assert_eq!(LogLevel::from_str(level.name()), Ok(level));
    }
}

#[test]
fn logfilter() {
    macro_rules! test_filter {
        ($level:ident, $expect:literal) => {
            assert_eq!(format!("{}", LogFilter::from(LogLevel::$level)), $expect);
        };
    }

    test_filter!(Trace, "LogFilter(TRACE,DEBUG,INFO,WARN,ERROR)");
    test_filter!(Debug, "LogFilter(DEBUG,INFO,WARN,ERROR)");
    test_filter!(Info, "LogFilter(INFO,WARN,ERROR)");
    test_filter!(Warn, "LogFilter(WARN,ERROR)");
    test_filter!(Error, "LogFilter(ERROR)");
    test_filter!(Off, "LogFilter()");
    test_filter!(Open, "LogFilter(OPEN,CLOSE)");
    test_filter!(Close, "LogFilter(OPEN,CLOSE)");

    macro_rules! test_fromstr {
        ($in:literal, $expect:literal) => {
            assert_eq!(format!("{}", LogFilter::from_str($in).unwrap()), $expect);
        };
    }

    test_fromstr!("warn", "LogFilter(WARN,ERROR)");
    test_fromstr!("info,close", "LogFilter(INFO,WARN,ERROR,OPEN,CLOSE)");
    test_fromstr!("off,error", "LogFilter(ERROR)");
    assert_eq!(Err(LogLevelError), LogFilter::from_str("warn,loud"));

    assert_eq!(
        format!("{}", LogFilter::all(&[LogLevel::Debug, LogLevel::Open])),
        "LogFilter(DEBUG,INFO,WARN,ERROR,OPEN,CLOSE)"
    );

    let mut filter = LogFilter::new();
    assert!(filter.is_empty());
    filter |= LogFilter::from(LogLevel::Error);
    assert!(!filter.is_empty());
    assert!(filter.allows(LogLevel::Error));
    assert!(!filter.allows(LogLevel::Warn));
    assert!(!filter.allows(LogLevel::Off));
    assert_eq!(
        filter | LogFilter::from(LogLevel::Open),
        LogFilter::from_str("open,error").unwrap()
    );
}

#[cfg(feature = "logger")]
#[test]
fn logger() {
    use std::fmt::Arguments;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc;

    // Flattens the key-value pairs into a string for easy comparison
    #[derive(Default)]
    struct Flatten(String);
    impl LogVisitor for Flatten {
        fn kv_u64(&mut self, key: Option<&str>, val: u64) {
            match key {
                Some(key) => self.0 += &format!(" {}={}", key, val),
                None => self.0 += &format!(" {}", val),
            }
        }
        fn kv_null(&mut self, key: Option<&str>) {
            self.0 += &format!(" {}", key.unwrap_or("-"));
        }
        fn kv_str(&mut self, key: Option<&str>, val: &str) {
            self.0 += &format!(" {}={:?}", key.unwrap_or("-"), val);
        }
        fn kv_fmt(&mut self, key: Option<&str>, val: &Arguments<'_>) {
            self.0 += &format!(" {}={:?}", key.unwrap_or("-"), val.to_string());
        }
        fn kv_arr(&mut self, key: Option<&str>) {
            self.0 += &format!(" {}=[", key.unwrap_or("-"));
        }
        fn kv_arrend(&mut self, _: Option<&str>) {
            self.0 += " ]";
        }
    }

    let (tx, rx) = mpsc::channel();
    let lt = LoopThread::spawn(move |thunker| {
        assert!(!thunker.log_check(LogLevel::Warn));
        thunker.set_logger(
            LogFilter::all(&[LogLevel::Debug, LogLevel::Open]),
            move |r| {
                let mut kv = Flatten::default();
                (r.kvscan)(&mut kv);
                let line = format!("{} {}: {}{}", r.id, r.level, r.fmt, kv.0);
                let _ = tx.send(line);
            },
        );
        assert!(thunker.log_check(LogLevel::Warn));
        assert!(!thunker.log_check(LogLevel::Trace));
    });
    let sub = lt.submitter();

    let k1 = ActionKey::allocate();
    let mut thunk = Thunk::from_fn(|| Ok::<_, ()>(()));
    thunk.add_action_key(k1);
    let p1 = thunk.dispatch_to(&sub).unwrap();
    let id1 = p1.action_keys()[1];
    assert_eq!(p1.wait(), Ok(()));

    let p2 = Thunk::from_fn(|| Err::<(), _>("oops"))
        .dispatch_to(&sub)
        .unwrap();
    let id2 = p2.action_keys()[0];
    assert_eq!(p2.wait(), Err(ThunkError::Action("oops")));

    let p3 = Thunk::from_fn(|| -> Result<(), ()> { panic!("TEST PANIC") })
        .dispatch_to(&sub)
        .unwrap();
    let id3 = p3.action_keys()[0];
    assert!(panic::catch_unwind(AssertUnwindSafe(|| p3.wait())).is_err());

    assert_eq!(lt.stop(), None);
    let lines: Vec<String> = rx.iter().collect();
    assert_eq!(
        lines,
        [
            format!("{0} OPEN: thunk keys=[ {1} {0} ]", id1.get(), k1.get()),
            format!("{} CLOSE: ", id1.get()),
            format!("{0} OPEN: thunk keys=[ {0} ]", id2.get()),
            format!("{} DEBUG: action failed", id2.get()),
            format!("{} CLOSE: action failed failed", id2.get()),
            format!("{0} OPEN: thunk keys=[ {0} ]", id3.get()),
            format!("{} WARN: action panicked: TEST PANIC", id3.get()),
            format!("{} CLOSE: TEST PANIC panicked", id3.get()),
        ]
    );
}
