use tantivy::tokenizer::{LowerCaser, TextAnalyzer, TokenStream, WhitespaceTokenizer};

/// Whitespace split plus lowercasing. No stemming and no stop words, so
/// every query term can match verbatim.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(WhitespaceTokenizer::default()).filter(LowerCaser).build()
}

pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() { tokens.push(stream.token().text.clone()); }
	tokens
}
