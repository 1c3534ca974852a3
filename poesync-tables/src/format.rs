//! Positional placeholder formatting and observable localized strings
//!
//! Localized entries use `%@` as a positional placeholder: the first `%@`
//! receives the first argument, the second `%@` the second one and so on.
//!
//! [`LocaleString`] binds one entry key to a set of arguments and pushes the
//! rendered text to its observers whenever it is refreshed. Observers are
//! registered with [`LocaleString::subscribe`] and stay registered for as long
//! as the returned [`Subscription`] is alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::TableCollection;

/// The positional placeholder token
pub const PLACEHOLDER: &str = "%@";

/// Substitute each `%@` in `pattern` with the next argument
///
/// Placeholders without a matching argument are kept as-is and surplus
/// arguments are ignored.
///
/// ```ignore
/// assert_eq!(format_positional("%@ has %@ items", &["Ann", "3"]), "Ann has 3 items");
/// ```
pub fn format_positional<S: AsRef<str>>(pattern: &str, args: &[S]) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut rest = pattern;
    let mut args = args.iter();

    while let Some(idx) = rest.find(PLACEHOLDER) {
        let Some(arg) = args.next() else {
            break;
        };
        result.push_str(&rest[..idx]);
        result.push_str(arg.as_ref());
        rest = &rest[idx + PLACEHOLDER.len()..];
    }
    result.push_str(rest);
    result
}

type Observer = Rc<dyn Fn(&str)>;
type ObserverList = RefCell<Vec<(u64, Observer)>>;

/// A localized entry bound to formatting arguments
pub struct LocaleString {
    key: String,
    args: Vec<String>,
    observers: Rc<ObserverList>,
    next_id: Cell<u64>,
}

impl LocaleString {
    pub fn new(key: &str, args: Vec<String>) -> Self {
        LocaleString {
            key: key.to_owned(),
            args,
            observers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Register an observer for refreshed text
    ///
    /// The observer is removed when the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unregisters the observer immediately"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&str) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        Subscription {
            id,
            observers: Rc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Render the entry for `locale` without notifying observers
    pub fn render(&self, strings: &TableCollection, locale: &str) -> String {
        strings.localize(locale, &self.key, &self.args)
    }

    /// Render the entry for `locale` and push the text to every observer
    pub fn refresh(&self, strings: &TableCollection, locale: &str) -> String {
        let text = self.render(strings, locale);
        // Observers may drop their own subscription while being notified.
        let snapshot: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(&text);
        }
        text
    }

    /// Replace the formatting arguments and refresh
    pub fn set_arguments(
        &mut self,
        args: Vec<String>,
        strings: &TableCollection,
        locale: &str,
    ) -> String {
        self.args = args;
        self.refresh(strings, locale)
    }
}

impl fmt::Debug for LocaleString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocaleString")
            .field("key", &self.key)
            .field("args", &self.args)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Keeps an observer registered on a [`LocaleString`]
pub struct Subscription {
    id: u64,
    observers: Weak<ObserverList>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StringTable;

    fn strings() -> TableCollection {
        let mut en = StringTable::new("en");
        en.insert("score", "%@ scored %@ points");
        let mut fr = StringTable::new("fr");
        fr.insert("score", "%@ a marqué %@ points");

        let mut strings = TableCollection::new("Strings");
        strings.add_table(en).add_table(fr);
        strings
    }

    #[test]
    fn test_format_in_order() {
        assert_eq!(
            format_positional("%@ has %@ items", &["Ann", "3"]),
            "Ann has 3 items"
        );
    }

    #[test]
    fn test_format_missing_arguments_keep_placeholder() {
        assert_eq!(format_positional("%@ and %@", &["one"]), "one and %@");
    }

    #[test]
    fn test_format_surplus_arguments_ignored() {
        assert_eq!(format_positional("only %@", &["a", "b"]), "only a");
        assert_eq!(format_positional("none", &["a"]), "none");
    }

    #[test]
    fn test_format_argument_containing_placeholder_is_not_reexpanded() {
        assert_eq!(format_positional("%@ / %@", &["%@", "x"]), "%@ / x");
    }

    #[test]
    fn test_refresh_notifies_observers() {
        let strings = strings();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let text = LocaleString::new("score", vec!["Ann".into(), "3".into()]);

        let sink = Rc::clone(&seen);
        let _subscription = text.subscribe(move |s| sink.borrow_mut().push(s.to_string()));

        text.refresh(&strings, "en");
        text.refresh(&strings, "fr");

        assert_eq!(
            *seen.borrow(),
            vec!["Ann scored 3 points", "Ann a marqué 3 points"]
        );
    }

    #[test]
    fn test_set_arguments_rerenders() {
        let strings = strings();
        let mut text = LocaleString::new("score", vec!["Ann".into(), "3".into()]);
        let rendered = text.set_arguments(vec!["Bo".into(), "7".into()], &strings, "en");
        assert_eq!(rendered, "Bo scored 7 points");
        assert_eq!(text.arguments(), &["Bo".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let strings = strings();
        let count = Rc::new(Cell::new(0));
        let text = LocaleString::new("score", vec![]);

        let counter = Rc::clone(&count);
        let subscription = text.subscribe(move |_| counter.set(counter.get() + 1));
        assert_eq!(text.observer_count(), 1);

        text.refresh(&strings, "en");
        drop(subscription);
        text.refresh(&strings, "en");

        assert_eq!(count.get(), 1);
        assert_eq!(text.observer_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_string_is_harmless() {
        let text = LocaleString::new("score", vec![]);
        let subscription = text.subscribe(|_| {});
        drop(text);
        drop(subscription);
    }
}
