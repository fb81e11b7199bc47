use std::fmt;

use playground_core::model::ProjectSource;

const STARTER_MARKUP: &str = r#"<div class="container">
    <h1>Welcome to Code Playground!</h1>
    <p>Start editing HTML, CSS, and JavaScript to see your changes live.</p>
    <button id="demo-btn" class="btn">Click me!</button>
</div>"#;

const STARTER_STYLE: &str = r#"/* Add your CSS here */
.container {
    font-family: Arial, sans-serif;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
    text-align: center;
}

h1 {
    color: #316dca;
}

p {
    color: #333;
    margin-bottom: 20px;
}

.btn {
    background-color: #3a99f4;
    color: white;
    border: none;
    padding: 10px 20px;
    border-radius: 5px;
    cursor: pointer;
}

.btn:hover {
    background-color: #2980b9;
}"#;

const STARTER_SCRIPT: &str = r#"// Add your JavaScript here
document.getElementById('demo-btn').addEventListener('click', function() {
    alert('Button clicked!');
});"#;

/// The editor tabs, in display order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pane {
    #[default]
    Html,
    Css,
    Js,
}

impl Pane {
    pub fn as_str(self) -> &'static str {
        match self {
            Pane::Html => "html",
            Pane::Css => "css",
            Pane::Js => "js",
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editor buffers and the selected tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorState {
    source: ProjectSource,
    active: Pane,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::starter()
    }
}

impl EditorState {
    /// The welcome project a fresh editor opens with.
    pub fn starter() -> Self {
        Self {
            source: ProjectSource::new(STARTER_MARKUP, STARTER_STYLE, STARTER_SCRIPT),
            active: Pane::Html,
        }
    }

    pub fn from_source(source: ProjectSource) -> Self {
        Self {
            source,
            active: Pane::Html,
        }
    }

    pub fn active(&self) -> Pane {
        self.active
    }

    pub fn switch_tab(&mut self, pane: Pane) {
        self.active = pane;
    }

    pub fn buffer(&self, pane: Pane) -> &str {
        match pane {
            Pane::Html => &self.source.markup,
            Pane::Css => &self.source.style,
            Pane::Js => &self.source.script,
        }
    }

    pub fn set_buffer(&mut self, pane: Pane, text: impl Into<String>) {
        let slot = match pane {
            Pane::Html => &mut self.source.markup,
            Pane::Css => &mut self.source.style,
            Pane::Js => &mut self.source.script,
        };
        *slot = text.into();
    }

    /// Swap in a loaded project. The active tab is kept.
    pub fn replace(&mut self, source: ProjectSource) {
        self.source = source;
    }

    /// Back to the starter project; the active tab is kept.
    pub fn reset(&mut self) {
        self.source = Self::starter().source;
    }

    pub fn source(&self) -> &ProjectSource {
        &self.source
    }

    pub fn snapshot(&self) -> ProjectSource {
        self.source.clone()
    }
}
