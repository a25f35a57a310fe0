use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bibtex::Bibliography;
use crate::download::SavedPdf;
use crate::error::Result;
use crate::identifiers::{Identifier, InspireId};
use crate::inspire::PaperRecord;
use crate::output::ensure_dir;
use crate::report::{PaperOutcome, RunMode, RunReport};
use crate::retrieve::PaperPipeline;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Also fetch this paper, after the ones already in the bibliography.
    pub extra: Option<Identifier>,
    /// Re-download PDFs only; leave the bibliography file alone.
    pub skip_bibliography: bool,
}

/// Re-fetches every arXiv paper cited in a bibliography.
pub struct BatchUpdater {
    pipeline: Arc<PaperPipeline>,
}

fn targets(bib: &Bibliography, extra: Option<Identifier>) -> Vec<Identifier> {
    let mut targets: Vec<Identifier> = bib.arxiv_ids().into_iter().map(Identifier::Arxiv).collect();
    if let Some(extra) = extra {
        let known = extra.arxiv_id().is_some_and(|wanted| {
            targets
                .iter()
                .filter_map(Identifier::arxiv_id)
                .any(|id| id.id == wanted.id)
        });
        if !known {
            targets.push(extra);
        }
    }
    targets
}

impl BatchUpdater {
    pub fn new(pipeline: Arc<PaperPipeline>) -> Self {
        Self { pipeline }
    }

    /// Runs the pipeline once per arXiv id of the bibliography at `bib_path`.
    /// Each success is merged and saved right away; failures are reported and
    /// leave their entries untouched. A target resolving to an INSPIRE record
    /// already fetched in this run is skipped. Only reading or writing the
    /// bibliography aborts the run.
    pub async fn run(
        &self,
        directory: &Path,
        bib_path: &Path,
        options: UpdateOptions,
    ) -> Result<RunReport> {
        let mut bib = Bibliography::load(bib_path)?;
        ensure_dir(directory)?;

        let targets = targets(&bib, options.extra);
        info!(
            path = %bib_path.display(),
            papers = targets.len(),
            "updating bibliography"
        );

        let mut report = RunReport::new(
            RunMode::Update,
            (!options.skip_bibliography).then(|| bib_path.to_path_buf()),
        );
        let mut fetched = HashSet::new();
        for identifier in &targets {
            let (record, pdf) = match self.fetch_once(identifier, directory, &mut fetched).await {
                Ok(Some(paper)) => paper,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%identifier, error = %e, "skipping paper");
                    report.push(PaperOutcome::failed(identifier, &e));
                    continue;
                }
            };
            let merge = if options.skip_bibliography {
                None
            } else {
                let outcome = bib.merge(record.entry.clone());
                bib.save(bib_path)?;
                Some(outcome)
            };
            report.push(PaperOutcome::ok(&record, pdf, merge));
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "update finished"
        );
        Ok(report)
    }

    /// `None` when the record was already fetched under another identifier.
    async fn fetch_once(
        &self,
        identifier: &Identifier,
        directory: &Path,
        fetched: &mut HashSet<InspireId>,
    ) -> Result<Option<(PaperRecord, SavedPdf)>> {
        let record = self.pipeline.lookup(identifier).await?;
        if fetched.contains(&record.inspire_id) {
            info!(%identifier, inspire_id = %record.inspire_id, "already fetched in this run");
            return Ok(None);
        }
        let pdf = self.pipeline.download(&record, directory).await?;
        fetched.insert(record.inspire_id.clone());
        Ok(Some((record, pdf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExitCode, PaperError};
    use crate::identifiers::{ArxivId, InspireId};
    use crate::testutil::{PDF, StubSource, paper, pipeline};
    use mockito::Server;
    use tempfile::TempDir;

    const LIBRARY: &str = r#"@article{Maldacena:1997re,
    author = "Maldacena, Juan Martin",
    title = "{old title}",
    eprint = "hep-th/9711200",
    archivePrefix = "arXiv",
    year = "1998"
}

@book{Weinberg:1995mt,
    author = "Weinberg, Steven",
    title = "{The Quantum theory of fields. Vol. 1: Foundations}",
    year = "2005"
}

@article{Ghost:2024xx,
    eprint = "2401.99999",
    archivePrefix = "arXiv",
    title = "{Withdrawn}"
}

@article{ATLAS:2012yve,
    eprint = "1207.7214v1",
    title = "{old ATLAS}"
}
"#;

    fn source(server: &Server) -> StubSource {
        StubSource::default()
            .with(paper(
                "hep-th/9711200",
                "451647",
                "Maldacena:1997re",
                "Maldacena, Juan Martin",
                "The Large N limit of superconformal field theories and supergravity",
                &server.url(),
            ))
            .with(paper(
                "1207.7214",
                "1124337",
                "ATLAS:2012yve",
                "Aad, Georges",
                "Observation of a new particle",
                &server.url(),
            ))
            .with(paper(
                "hep-th/9802150",
                "469048",
                "Witten:1998qj",
                "Witten, Edward",
                "Anti de Sitter space and holography",
                &server.url(),
            ))
    }

    async fn serve_pdfs(server: &mut Server, paths: &[&str]) -> Vec<mockito::Mock> {
        let mut mocks = Vec::new();
        for path in paths {
            mocks.push(
                server
                    .mock("GET", *path)
                    .with_status(200)
                    .with_body(PDF)
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    #[test]
    fn targets_are_distinct_and_ordered() {
        let bib = Bibliography::parse(LIBRARY).unwrap();
        let ids: Vec<_> = targets(&bib, None).iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["arXiv:hep-th/9711200", "arXiv:2401.99999", "arXiv:1207.7214"]);

        let known = Identifier::Arxiv(ArxivId::parse("1207.7214v3").unwrap());
        assert_eq!(targets(&bib, Some(known)).len(), 3);

        let extra = Identifier::Inspire(InspireId::parse("469048").unwrap());
        let all = targets(&bib, Some(extra));
        assert_eq!(all.last().unwrap().to_string(), "inspire:469048");
    }

    #[tokio::test]
    async fn mixed_results_keep_going_and_persist_successes() {
        let mut server = Server::new_async().await;
        let _pdfs = serve_pdfs(&mut server, &["/pdf/hep-th/9711200", "/pdf/1207.7214"]).await;

        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, LIBRARY).unwrap();

        let updater = BatchUpdater::new(Arc::new(pipeline(source(&server))));
        let report = updater
            .run(tmp.path(), &bib_path, UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert_ne!(report.exit_code(), ExitCode::Success);
        match &report.papers[1] {
            PaperOutcome::Failed { identifier, .. } => assert_eq!(identifier, "arXiv:2401.99999"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let bib = Bibliography::load(&bib_path).unwrap();
        let keys: Vec<_> = bib.entries().map(|e| e.citation_key.as_str()).collect();
        assert_eq!(
            keys,
            ["Weinberg:1995mt", "Ghost:2024xx", "Maldacena:1997re", "ATLAS:2012yve"]
        );
        assert_eq!(
            bib.get("Ghost:2024xx").unwrap().get_unquoted("title"),
            Some("{Withdrawn}")
        );
        assert_eq!(
            bib.get("ATLAS:2012yve").unwrap().get_unquoted("title"),
            Some("{Observation of a new particle}")
        );

        assert!(tmp.path().join("Aad2012_ObservationOfANewParticle.pdf").exists());
        assert!(
            tmp.path()
                .join("Maldacena1997_TheLargeNLimitOfSuperconformalFieldTheoriesAndSupergravity.pdf")
                .exists()
        );
    }

    #[tokio::test]
    async fn failed_download_leaves_entry_untouched() {
        let mut server = Server::new_async().await;
        let _ok = serve_pdfs(&mut server, &["/pdf/hep-th/9711200"]).await;
        let _gone = server
            .mock("GET", "/pdf/1207.7214")
            .with_status(503)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, LIBRARY).unwrap();

        let report = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 1);

        let bib = Bibliography::load(&bib_path).unwrap();
        assert_eq!(
            bib.get("ATLAS:2012yve").unwrap().get_unquoted("title"),
            Some("{old ATLAS}")
        );
    }

    #[tokio::test]
    async fn extra_identifier_is_appended() {
        let mut server = Server::new_async().await;
        let _pdfs = serve_pdfs(
            &mut server,
            &["/pdf/hep-th/9711200", "/pdf/1207.7214", "/pdf/hep-th/9802150"],
        )
        .await;

        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, LIBRARY).unwrap();

        let options = UpdateOptions {
            extra: Some(Identifier::Arxiv(ArxivId::parse("hep-th/9802150").unwrap())),
            ..Default::default()
        };
        let report = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, options)
            .await
            .unwrap();
        assert_eq!(report.papers.len(), 4);

        let bib = Bibliography::load(&bib_path).unwrap();
        assert_eq!(bib.entries().last().unwrap().citation_key, "Witten:1998qj");
    }

    #[tokio::test]
    async fn extra_resolving_to_a_cited_paper_is_fetched_once() {
        let mut server = Server::new_async().await;
        let _maldacena = serve_pdfs(&mut server, &["/pdf/hep-th/9711200"]).await;
        let atlas = server
            .mock("GET", "/pdf/1207.7214")
            .with_status(200)
            .with_body(PDF)
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, LIBRARY).unwrap();

        let options = UpdateOptions {
            extra: Some(Identifier::Inspire(InspireId::parse("1124337").unwrap())),
            ..Default::default()
        };
        let report = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, options)
            .await
            .unwrap();

        assert_eq!(report.papers.len(), 3);
        assert_eq!(report.succeeded(), 2);
        atlas.assert_async().await;

        let bib = Bibliography::load(&bib_path).unwrap();
        assert_eq!(bib.len(), 4);
    }

    #[tokio::test]
    async fn skip_bibliography_only_downloads() {
        let mut server = Server::new_async().await;
        let _pdfs = serve_pdfs(&mut server, &["/pdf/hep-th/9711200", "/pdf/1207.7214"]).await;

        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, LIBRARY).unwrap();

        let options = UpdateOptions {
            skip_bibliography: true,
            ..Default::default()
        };
        let report = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, options)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert!(report.bibliography.is_none());
        assert_eq!(std::fs::read_to_string(&bib_path).unwrap(), LIBRARY);
    }

    #[tokio::test]
    async fn unreadable_bibliography_aborts() {
        let server = Server::new_async().await;
        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");
        std::fs::write(&bib_path, "@article{x, title = {open").unwrap();

        let err = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaperError::Parse { .. }));
    }

    #[tokio::test]
    async fn missing_bibliography_updates_nothing() {
        let server = Server::new_async().await;
        let tmp = TempDir::new().unwrap();
        let bib_path = tmp.path().join("papers.bib");

        let report = BatchUpdater::new(Arc::new(pipeline(source(&server))))
            .run(tmp.path(), &bib_path, UpdateOptions::default())
            .await
            .unwrap();
        assert!(report.papers.is_empty());
        assert_eq!(report.exit_code(), ExitCode::Success);
        assert!(!bib_path.exists());
    }
}
