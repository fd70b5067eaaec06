//! Canned weather and search lookups.
//!
//! Both tools answer from fixed tables; they exist so a chat can exercise
//! tool calling without network access.

const WEATHER: &[(&str, &str)] = &[
    ("Seattle", "52°F, Partly Cloudy"),
    ("New York", "45°F, Clear"),
    ("London", "10°C, Rainy"),
    ("San Francisco", "58°F, Foggy"),
    ("Tokyo", "18°C, Sunny"),
    ("Paris", "12°C, Overcast"),
    ("Sydney", "22°C, Sunny"),
];

// Checked in order; the first keyword contained in the query wins.
const SEARCH: &[(&str, &str)] = &[
    (
        "weather",
        "Current weather varies by location. Use weather APIs for real-time data.",
    ),
    (
        "python",
        "Python is a high-level, interpreted programming language known for its simplicity and readability.",
    ),
    (
        "ai",
        "Artificial Intelligence (AI) is transforming industries including healthcare, finance, and technology.",
    ),
    (
        "ollama",
        "Ollama is a tool for running large language models locally on your machine.",
    ),
    (
        "fastmcp",
        "FastMCP is a framework for building Model Context Protocol servers.",
    ),
    (
        "machine learning",
        "Machine learning is a subset of AI focused on algorithms that learn from data.",
    ),
];

/// Current conditions for a known city. Lookup is exact.
pub fn weather(location: &str) -> String {
    WEATHER
        .iter()
        .find(|(city, _)| *city == location)
        .map(|(_, report)| report.to_string())
        .unwrap_or_else(|| format!("Weather data not available for {location}"))
}

pub fn search(query: &str) -> String {
    let lowered = query.to_lowercase();
    let answer = SEARCH
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, answer)| *answer)
        .unwrap_or("No specific information found in mock database. Try a different query.");
    format!("Search results for '{query}': {answer}")
}
