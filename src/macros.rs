/// Build an argument vector (`Vec<String>`) from string-like expressions.
///
/// ```
/// let argv = ensemble::words!["test_numbers", "one", 1.to_string()];
/// assert_eq!(argv, vec!["test_numbers".to_string(), "one".into(), "1".into()]);
/// ```
#[macro_export]
macro_rules! words {
    () => {
        ::std::vec::Vec::<::std::string::String>::new()
    };
    ($($word:expr),+ $(,)?) => {
        ::std::vec![ $(::std::string::String::from($word)),+ ]
    };
}
