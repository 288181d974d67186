use hybridrag_core::traits::Tokenizer;

/// Lowercase, then split on whitespace. Punctuation stays attached to words,
/// so "learning." and "learning" are different terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceLowercase;

impl WhitespaceLowercase {
	pub const ID: &'static str = "whitespace-lowercase";
}

impl Tokenizer for WhitespaceLowercase {
	fn id(&self) -> &str { Self::ID }

	fn tokenize(&self, text: &str) -> Vec<String> {
		text.to_lowercase().split_whitespace().map(str::to_string).collect()
	}
}

/// Splits on any non-alphanumeric character, lowercases, and drops common
/// English stop words.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopwordLowercase;

impl StopwordLowercase {
	pub const ID: &'static str = "alnum-lowercase-stopwords";
}

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

impl Tokenizer for StopwordLowercase {
	fn id(&self) -> &str { Self::ID }

	fn tokenize(&self, text: &str) -> Vec<String> {
		text.split(|c: char| !c.is_alphanumeric())
			.filter(|t| !t.is_empty())
			.map(str::to_lowercase)
			.filter(|t| !STOP_WORDS.contains(&t.as_str()))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn whitespace_lowercase_matches_lower_split() {
		let tokens = WhitespaceLowercase.tokenize("  Machine   Learning\tis FUN. ");
		assert_eq!(tokens, vec!["machine", "learning", "is", "fun."]);
		assert!(WhitespaceLowercase.tokenize(" \n ").is_empty());
	}

	#[test]
	fn stopword_tokenizer_strips_punctuation_and_stop_words() {
		let tokens = StopwordLowercase.tokenize("The quick-brown fox, and THE lazy dog.");
		assert_eq!(tokens, vec!["quick", "brown", "fox", "lazy", "dog"]);
	}

	#[test]
	fn ids_are_distinct() {
		assert_ne!(WhitespaceLowercase.id(), StopwordLowercase.id());
	}
}
