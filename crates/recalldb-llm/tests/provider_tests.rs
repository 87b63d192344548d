use recalldb_core::config::LlmSettings;
use recalldb_llm::get_default_language_model;

#[test]
fn ollama_is_the_default_provider() {
    let model = get_default_language_model(&LlmSettings::default()).expect("model");
    assert_eq!(model.model_id(), "ollama:gemma2:27b");
}

#[test]
fn openai_provider_uses_configured_key_env() {
    std::env::set_var("RECALLDB_TEST_OPENAI_KEY", "sk-test");
    let settings = LlmSettings {
        provider: "openai".into(),
        model: "gpt-4o-mini".into(),
        base_url: "https://api.openai.com/v1".into(),
        api_key_env: "RECALLDB_TEST_OPENAI_KEY".into(),
        ..LlmSettings::default()
    };
    let model = get_default_language_model(&settings).expect("model");
    assert_eq!(model.model_id(), "openai:gpt-4o-mini");
}

#[test]
fn openai_provider_without_key_fails() {
    let settings = LlmSettings {
        provider: "openai".into(),
        api_key_env: "RECALLDB_TEST_KEY_THAT_IS_NOT_SET".into(),
        ..LlmSettings::default()
    };
    assert!(get_default_language_model(&settings).is_err());
}

#[test]
fn unknown_provider_fails() {
    let settings = LlmSettings { provider: "markov".into(), ..LlmSettings::default() };
    assert!(get_default_language_model(&settings).is_err());
}
