/// What the submission boundary knows about an argument when deciding
/// whether to proxy it.
#[derive(Clone, Copy, Debug)]
pub struct ArgInfo<'a> {
    /// The argument's Rust type name.
    pub type_name: &'a str,
    /// Size of the argument's serialized form, in bytes.
    pub serialized_len: usize,
}

/// Predicate deciding which task arguments are replaced by proxies
/// before submission.
pub trait ShouldProxy: Send + Sync {
    fn should_proxy(&self, arg: &ArgInfo<'_>) -> bool;
}

/// Proxy every argument.
pub struct ProxyAlways;

impl ShouldProxy for ProxyAlways {
    fn should_proxy(&self, _arg: &ArgInfo<'_>) -> bool {
        true
    }
}

/// Never proxy; every argument is transmitted inline.
pub struct ProxyNever;

impl ShouldProxy for ProxyNever {
    fn should_proxy(&self, _arg: &ArgInfo<'_>) -> bool {
        false
    }
}

/// Proxy arguments whose serialized form exceeds a byte threshold.
///
/// The usual choice: small arguments ride along with the task cheaply,
/// large ones go through the store so the task message stays small.
pub struct ProxyMinSize(pub usize);

impl ShouldProxy for ProxyMinSize {
    fn should_proxy(&self, arg: &ArgInfo<'_>) -> bool {
        arg.serialized_len > self.0
    }
}

/// Proxy arguments whose type name contains one of the given needles.
///
/// The closest analog of proxy-by-type membership in a statically typed
/// setting; matches on `std::any::type_name` output, so needles like
/// `"Vec<f64>"` or a domain type's name work as expected.
pub struct ProxyTypeName {
    needles: Vec<String>,
}

impl ProxyTypeName {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles.into_iter().map(Into::into).collect(),
        }
    }
}

impl ShouldProxy for ProxyTypeName {
    fn should_proxy(&self, arg: &ArgInfo<'_>) -> bool {
        self.needles
            .iter()
            .any(|needle| arg.type_name.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(type_name: &'static str, serialized_len: usize) -> ArgInfo<'static> {
        ArgInfo {
            type_name,
            serialized_len,
        }
    }

    #[test]
    fn always_and_never() {
        let arg = info("alloc::vec::Vec<u8>", 10);
        assert!(ProxyAlways.should_proxy(&arg));
        assert!(!ProxyNever.should_proxy(&arg));
    }

    #[test]
    fn min_size_threshold_is_strict() {
        let policy = ProxyMinSize(1024);
        assert!(!policy.should_proxy(&info("t", 10)));
        assert!(!policy.should_proxy(&info("t", 1024)));
        assert!(policy.should_proxy(&info("t", 1025)));
        assert!(policy.should_proxy(&info("t", 10_000)));
    }

    #[test]
    fn type_name_matching() {
        let policy = ProxyTypeName::new(["Vec<f64>"]);
        assert!(policy.should_proxy(&info("alloc::vec::Vec<f64>", 1)));
        assert!(!policy.should_proxy(&info("alloc::string::String", 1)));
    }
}
