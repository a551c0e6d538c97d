/*!
 * Full app lifecycle: import, translate, edit, export and cleanup
 */

use std::io::Read;
use std::sync::Arc;
use vntl::database::Repository;
use vntl::extraction::SourceFormat;
use vntl::providers::mock::MockProvider;
use vntl::translation::{RunScope, RunState};
use vntl::Controller;
use crate::common::{
    create_temp_dir, create_test_file, init_logging, memory_controller, test_config, SAMPLE_SCRIPT,
};

const SAMPLE_JSON: &str = r#"{
  "portrait": "hero.png",
  "lines": ["Good morning!", "See you later."]
}"#;

#[tokio::test]
async fn test_importDir_thenExportArchive_shouldBundleRelativePaths() {
    init_logging();
    let input = create_temp_dir().unwrap();
    create_test_file(input.path(), "game/script.rpy", SAMPLE_SCRIPT).unwrap();
    create_test_file(input.path(), "data/lines.json", SAMPLE_JSON).unwrap();
    create_test_file(input.path(), "game/bg.png", "not a script").unwrap();
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();

    let records = controller.import_dir(input.path()).await.unwrap();
    let paths: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["data/lines.json", "game/script.rpy"]);

    for record in &records {
        let report = controller.translate(&record.id, RunScope::All, |_| {}).await.unwrap();
        assert_eq!(report.state, RunState::Completed);
    }

    let output = create_temp_dir().unwrap();
    let archive_path = output.path().join("translated.zip");
    let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(controller.export_archive(&ids, &archive_path).await.unwrap(), 2);

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let mut json = String::new();
    archive
        .by_name("data/lines.json")
        .unwrap()
        .read_to_string(&mut json)
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["portrait"], "hero.png");
    assert_eq!(parsed["lines"][0], "[vi] Good morning!");

    let mut script = String::new();
    archive
        .by_name("game/script.rpy")
        .unwrap()
        .read_to_string(&mut script)
        .unwrap();
    assert_eq!(script, controller.render(&records[1].id).await.unwrap());
    assert!(script.contains("e \"[vi] Hello [player_name]!\""));
}

#[tokio::test]
async fn test_exportFile_shouldWriteLocalizedName() {
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();
    let record = controller
        .import_text("script.rpy", "script.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
        .await
        .unwrap();
    controller.translate(&record.id, RunScope::All, |_| {}).await.unwrap();

    let output = create_temp_dir().unwrap();
    let path = controller.export_file(&record.id, output.path()).await.unwrap();

    assert_eq!(path, output.path().join("script.vi.rpy"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("\"[vi] The wind was cold.\""));
    assert!(written.contains("play music \"audio/theme.ogg\""));
}

#[tokio::test]
async fn test_editTranslation_thenRender_shouldUseManualText() {
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();
    let record = controller
        .import_text("s.rpy", "s.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
        .await
        .unwrap();

    assert!(controller
        .edit_translation(&record.items[2].id, Some("Gió lạnh.".to_string()))
        .await
        .unwrap());
    assert!(controller.render(&record.id).await.unwrap().contains("\"Gió lạnh.\""));

    // Clearing puts the original back
    controller.edit_translation(&record.items[2].id, None).await.unwrap();
    assert_eq!(controller.render(&record.id).await.unwrap(), SAMPLE_SCRIPT);
}

#[tokio::test]
async fn test_removeFile_shouldDeleteItemsWithIt() {
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();
    let record = controller
        .import_text("s.rpy", "s.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
        .await
        .unwrap();
    assert_eq!(controller.list_files().await.unwrap().len(), 1);

    assert!(controller.remove_file(&record.id).await.unwrap());

    assert!(controller.list_files().await.unwrap().is_empty());
    assert!(controller.repository().get_items(&record.id).await.unwrap().is_empty());
    assert!(controller.repository().get_item(&record.items[0].id).await.unwrap().is_none());
    assert!(!controller.remove_file(&record.id).await.unwrap());
    assert!(controller.render(&record.id).await.is_err());
}

#[test]
fn test_listFiles_shouldReportProgress() {
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();

    let files = tokio_test::block_on(async {
        let record = controller
            .import_text("s.rpy", "game/s.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
            .await?;
        controller
            .translate(&record.id, RunScope::Selected(vec![record.items[0].id.clone()]), |_| {})
            .await?;
        controller.list_files().await
    })
    .unwrap();

    assert_eq!(files[0].relative_path, "game/s.rpy");
    assert_eq!(files[0].item_count, 4);
    assert_eq!(files[0].translated_count, 1);
    assert_eq!(files[0].progress_percent(), 25.0);
}

#[tokio::test]
async fn test_memoryExport_thenImportElsewhere_shouldTranslateWithoutProvider() {
    let dir = create_temp_dir().unwrap();
    let tm_path = dir.path().join("memory.json");

    let source = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();
    let record = source
        .import_text("s.rpy", "s.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
        .await
        .unwrap();
    source.translate(&record.id, RunScope::All, |_| {}).await.unwrap();
    assert_eq!(source.memory().export_json(&tm_path).await.unwrap(), 4);

    let failing = MockProvider::failing();
    let target = Controller::with_parts(
        test_config(),
        Repository::new_in_memory().unwrap(),
        Arc::new(failing.clone()),
    );
    assert_eq!(target.memory().import_json(&tm_path).await.unwrap(), 4);
    let copy = target
        .import_text("s.rpy", "s.rpy", SAMPLE_SCRIPT, SourceFormat::Script)
        .await
        .unwrap();
    let report = target.translate(&copy.id, RunScope::All, |_| {}).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.memory_hits, 4);
    assert_eq!(failing.request_count(), 0);
    assert_eq!(
        target.render(&copy.id).await.unwrap(),
        source.render(&record.id).await.unwrap()
    );
}

#[tokio::test]
async fn test_run_withScriptFile_shouldWriteTranslationOnce() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    let script = create_test_file(input.path(), "intro.rpy", SAMPLE_SCRIPT).unwrap();
    let provider = MockProvider::working();
    let controller = memory_controller(test_config(), Arc::new(provider.clone())).unwrap();

    controller
        .run(script.clone(), output.path().to_path_buf(), false)
        .await
        .unwrap();
    let written = output.path().join("intro.vi.rpy");
    assert!(written.exists());
    let calls = provider.request_count();

    // Existing output is left alone without force
    controller
        .run(script, output.path().to_path_buf(), false)
        .await
        .unwrap();
    assert_eq!(provider.request_count(), calls);
}

#[tokio::test]
async fn test_run_repeated_shouldReuseStoredFile() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    let script = create_test_file(input.path(), "intro.rpy", SAMPLE_SCRIPT).unwrap();
    let provider = MockProvider::working();
    let controller = memory_controller(test_config(), Arc::new(provider.clone())).unwrap();

    for _ in 0..3 {
        controller
            .run(script.clone(), output.path().to_path_buf(), true)
            .await
            .unwrap();
    }

    assert_eq!(controller.list_files().await.unwrap().len(), 1);
    // Everything was committed by the first run
    assert_eq!(provider.request_count(), 1);
    let written = std::fs::read_to_string(output.path().join("intro.vi.rpy")).unwrap();
    assert!(written.contains("\"[vi] The wind was cold.\""));
}

#[tokio::test]
async fn test_run_afterFailedBatch_shouldResumeWithoutMemory() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    let script = create_test_file(input.path(), "intro.rpy", SAMPLE_SCRIPT).unwrap();
    let mut config = test_config();
    config.translation.common.batch_size = 1;
    config.translation.common.retry_count = 0;
    config.translation.common.use_translation_memory = false;
    // Calls 1 and 2 succeed, call 3 fails
    let provider = MockProvider::intermittent(3);
    let controller = memory_controller(config, Arc::new(provider.clone())).unwrap();

    assert!(controller
        .run(script.clone(), output.path().to_path_buf(), false)
        .await
        .is_err());
    assert_eq!(provider.request_count(), 3);
    assert!(!output.path().join("intro.vi.rpy").exists());

    controller
        .run(script, output.path().to_path_buf(), false)
        .await
        .unwrap();

    // Only the two lines left untranslated went out again
    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[3], requests[2]);
    assert_ne!(requests[4], requests[0]);
    assert_ne!(requests[4], requests[1]);
    assert_eq!(controller.list_files().await.unwrap().len(), 1);

    let written = std::fs::read_to_string(output.path().join("intro.vi.rpy")).unwrap();
    assert!(written.contains("e \"[vi] Hello [player_name]!\""));
    assert!(written.contains("\"[vi] The wind was cold.\""));
}

#[tokio::test]
async fn test_openFile_withChangedSource_shouldImportNewRecord() {
    let input = create_temp_dir().unwrap();
    let path = create_test_file(input.path(), "a.rpy", SAMPLE_SCRIPT).unwrap();
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();

    let first = controller.open_file(&path, None).await.unwrap();
    let again = controller.open_file(&path, None).await.unwrap();
    assert_eq!(first.id, again.id);

    std::fs::write(&path, "e \"Something else.\"\n").unwrap();
    let changed = controller.open_file(&path, None).await.unwrap();
    assert_ne!(changed.id, first.id);
    assert_eq!(changed.items.len(), 1);
}

#[tokio::test]
async fn test_run_withMissingInput_shouldFail() {
    let output = create_temp_dir().unwrap();
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();

    let result = controller
        .run(output.path().join("missing.rpy"), output.path().to_path_buf(), false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_runFolder_shouldMirrorDirectoryLayout() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    create_test_file(input.path(), "game/a.rpy", SAMPLE_SCRIPT).unwrap();
    create_test_file(input.path(), "game/sub/b.rpy", "e \"Bye now.\"\n").unwrap();
    let controller = memory_controller(test_config(), Arc::new(MockProvider::working())).unwrap();

    controller
        .run_folder(input.path().to_path_buf(), output.path().to_path_buf(), None, false)
        .await
        .unwrap();

    assert!(output.path().join("game/a.vi.rpy").exists());
    let b = std::fs::read_to_string(output.path().join("game/sub/b.vi.rpy")).unwrap();
    assert_eq!(b, "e \"[vi] Bye now.\"\n");
}

#[tokio::test]
async fn test_runFolder_withFailingProvider_shouldReportFailure() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    create_test_file(input.path(), "a.rpy", SAMPLE_SCRIPT).unwrap();
    let controller = memory_controller(test_config(), Arc::new(MockProvider::failing())).unwrap();

    let result = controller
        .run_folder(input.path().to_path_buf(), output.path().to_path_buf(), None, false)
        .await;

    assert!(result.is_err());
    assert!(!output.path().join("a.vi.rpy").exists());
}

#[tokio::test]
async fn test_runFolder_inPlaceTwice_shouldNotTranslateOwnOutput() {
    let dir = create_temp_dir().unwrap();
    create_test_file(dir.path(), "a.rpy", SAMPLE_SCRIPT).unwrap();
    let provider = MockProvider::working();
    let controller = memory_controller(test_config(), Arc::new(provider.clone())).unwrap();

    for _ in 0..2 {
        controller
            .run_folder(dir.path().to_path_buf(), dir.path().to_path_buf(), None, false)
            .await
            .unwrap();
    }

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.rpy", "a.vi.rpy"]);
    assert_eq!(controller.list_files().await.unwrap().len(), 1);
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_runFolder_withExistingOutput_shouldSkipUnlessForced() {
    let input = create_temp_dir().unwrap();
    let output = create_temp_dir().unwrap();
    create_test_file(input.path(), "game/a.rpy", SAMPLE_SCRIPT).unwrap();
    let existing = create_test_file(output.path(), "game/a.vi.rpy", "old").unwrap();
    let provider = MockProvider::working();
    let controller = memory_controller(test_config(), Arc::new(provider.clone())).unwrap();

    controller
        .run_folder(input.path().to_path_buf(), output.path().to_path_buf(), None, false)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), "old");
    assert_eq!(provider.request_count(), 0);
    assert!(controller.list_files().await.unwrap().is_empty());

    controller
        .run_folder(input.path().to_path_buf(), output.path().to_path_buf(), None, true)
        .await
        .unwrap();
    assert!(std::fs::read_to_string(&existing).unwrap().contains("[vi] Hello [player_name]!"));
}
