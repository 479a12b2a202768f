//! Interactive directory prompt for the terminal.

use std::sync::Arc;

use async_trait::async_trait;
use nu_ansi_term::{Color, Style};
use pyhost_resolve::{DirectoryHandle, DirectoryPicker, FsDirectory, ResolveError, Result};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin,
};
use tokio::sync::Mutex;

struct Styles {
    title: Style,
    action: Style,
    error: Style,
    chosen: Style,
}

impl Styles {
    fn colored() -> Self {
        Self {
            title: Style::new().bold(),
            action: Style::new().fg(Color::Black).on(Color::Cyan).bold(),
            error: Style::new().fg(Color::Red),
            chosen: Style::new().fg(Color::Green),
        }
    }

    fn plain() -> Self {
        Self {
            title: Style::new(),
            action: Style::new(),
            error: Style::new(),
            chosen: Style::new(),
        }
    }
}

/// Asks the user on a terminal which directory holds the sources.
///
/// The explanation is shown once; the user is asked again after an empty
/// line or a path that is not a directory. End of input gives up with
/// [`ResolveError::PromptClosed`]. There is no timeout.
pub struct PromptDirectoryPicker<R, W> {
    io: Mutex<(R, W)>,
    styles: Styles,
}

impl PromptDirectoryPicker<BufReader<Stdin>, Stderr> {
    /// Prompt on standard error and read the answer from standard input.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> PromptDirectoryPicker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
            styles: Styles::colored(),
        }
    }

    /// Turn off ANSI styling.
    pub fn plain(mut self) -> Self {
        self.styles = Styles::plain();
        self
    }

    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }
}

#[async_trait]
impl<R, W> DirectoryPicker for PromptDirectoryPicker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request_directory(&self) -> Result<Arc<dyn DirectoryHandle>> {
        let mut io = self.io.lock().await;
        let (input, output) = &mut *io;
        let styles = &self.styles;

        let banner = format!(
            "{}\nThis page was opened without a server, so sources are read from a\n\
             directory on this machine. It is asked for once per session.\n",
            styles.title.paint("Source directory needed")
        );
        output.write_all(banner.as_bytes()).await?;

        loop {
            let prompt = format!("{} ", styles.action.paint("[Choose directory]"));
            output.write_all(prompt.as_bytes()).await?;
            output.flush().await?;

            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                output.write_all(b"\n").await?;
                output.flush().await?;
                tracing::debug!("Directory prompt closed without a choice");
                return Err(ResolveError::PromptClosed);
            }

            let choice = line.trim();
            if choice.is_empty() {
                continue;
            }

            match FsDirectory::open(choice).await {
                Ok(dir) => {
                    let message = format!(
                        "{} {}\n",
                        styles.chosen.paint("Using"),
                        dir.path().display()
                    );
                    output.write_all(message.as_bytes()).await?;
                    output.flush().await?;
                    return Ok(Arc::new(dir));
                }
                Err(err) => {
                    let message = format!("{} {}\n", styles.error.paint("Cannot use it:"), err);
                    output.write_all(message.as_bytes()).await?;
                }
            }
        }
    }
}
