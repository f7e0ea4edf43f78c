//! Line-oriented query producer.

use crossbeam_channel::{Sender, select};
use log::{debug, info};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::PipelineError;

use super::shutdown::Shutdown;

/// Send every line of `path` as one query, stopping early on shutdown.
/// `queries` is dropped on return, which closes the stream for the executor.
pub fn read_queries(
    path: &Path,
    queries: Sender<String>,
    shutdown: &Shutdown,
) -> Result<usize, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut count = 0_usize;
    for line in BufReader::new(file).lines() {
        let mut query = line.map_err(|e| PipelineError::io(path, e))?;
        if query.ends_with('\r') {
            query.pop();
        }
        debug!("Query {:?} has been read", query);
        let sent = select! {
            send(queries, query) -> res => res.is_ok(),
            recv(shutdown.done()) -> _ => false,
        };
        if !sent {
            return Err(PipelineError::Aborted);
        }
        count += 1;
    }
    info!("Reader has finished ({} queries)", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    #[test]
    fn sends_each_line_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queries.txt");
        std::fs::write(&path, "red dress\r\nblue shoes\n\nhat").unwrap();
        let (tx, rx) = bounded(0);
        let shutdown = Shutdown::new();
        let reader = thread::spawn(move || read_queries(&path, tx, &shutdown));
        let got: Vec<String> = rx.iter().collect();
        assert_eq!(got, ["red dress", "blue shoes", "", "hat"]);
        assert_eq!(reader.join().unwrap().unwrap(), 4);
    }

    #[test]
    fn stops_on_shutdown_without_a_consumer() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queries.txt");
        std::fs::write(&path, "a\nb\n").unwrap();
        let (tx, _rx) = bounded(0);
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(matches!(
            read_queries(&path, tx, &shutdown),
            Err(PipelineError::Aborted)
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let (tx, _rx) = bounded(0);
        assert!(matches!(
            read_queries(Path::new("/no/such/queries.txt"), tx, &Shutdown::new()),
            Err(PipelineError::Io { .. })
        ));
    }
}
