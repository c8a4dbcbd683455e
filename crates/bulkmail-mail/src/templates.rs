//! Placeholder substitution for message content
//!
//! Two syntaxes are supported. Caller-supplied HTML templates use `{{key}}`
//! tokens bound from a [`TemplateContext`]; the built-in subject and body
//! defaults use a single-brace `{name}` token. Substitution is literal: no
//! expressions, no escaping, and unknown tokens are left in place.

/// Subject used when no subject template is configured
pub const DEFAULT_SUBJECT: &str = "A message from bulkmail";

/// Plain-text body used when no body template is configured
pub const DEFAULT_BODY: &str = "Hi {name},\n\nThis is an automated message sent with bulkmail.";

/// Ordered placeholder bindings
///
/// Bindings are applied in insertion order, so a later binding never sees a
/// token produced by an earlier one unless the earlier value contained it.
/// Duplicate keys are kept; the first binding for a key wins because it
/// consumes every occurrence of the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
	bindings: Vec<(String, String)>,
}

impl TemplateContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Context with the recipient bindings every row starts from
	///
	/// Binds `to_name` and `name` to the recipient name and `email` to the
	/// recipient address.
	pub fn for_recipient(name: &str, email: &str) -> Self {
		let mut context = Self::new();
		context.insert("to_name", name);
		context.insert("email", email);
		context.insert("name", name);
		context
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.bindings.push((key.into(), value.into()));
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.bindings
			.iter()
			.map(|(key, value)| (key.as_str(), value.as_str()))
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}

impl<K, V> Extend<(K, V)> for TemplateContext
where
	K: Into<String>,
	V: Into<String>,
{
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		for (key, value) in iter {
			self.insert(key, value);
		}
	}
}

/// Replace every `{{key}}` token with its bound value
///
/// # Examples
///
/// ```
/// use bulkmail_mail::{TemplateContext, render_template};
///
/// let context = TemplateContext::for_recipient("Ann", "ann@example.com");
/// let html = render_template("<p>Hi {{name}} ({{email}}) {{zzz}}</p>", &context);
/// assert_eq!(html, "<p>Hi Ann (ann@example.com) {{zzz}}</p>");
/// ```
pub fn render_template(template: &str, context: &TemplateContext) -> String {
	let mut rendered = template.to_string();
	for (key, value) in context.iter() {
		let token = format!("{{{{{}}}}}", key);
		if rendered.contains(&token) {
			rendered = rendered.replace(&token, value);
		}
	}
	rendered
}

/// Fill the single-brace `{name}` token of a default-style template
///
/// Only the first occurrence is replaced.
///
/// # Examples
///
/// ```
/// use bulkmail_mail::render_default;
///
/// assert_eq!(render_default("Hi {name}, {name}", "Bo"), "Hi Bo, {name}");
/// ```
pub fn render_default(template: &str, name: &str) -> String {
	template.replacen("{name}", name, 1)
}

/// HTML fallback for a plain-text body
pub fn wrap_pre(text: &str) -> String {
	format!("<pre>{}</pre>", text)
}
