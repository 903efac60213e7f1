//! Tests for the broker.

#[cfg(test)]
mod broker_tests {
    use std::any::Any;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use serde::{Deserialize, Serialize};
    use serde::de::DeserializeOwned;

    use crate::broker::{
        AcceptAll, AllowAnonymous, BoxError, Broker, BrokerConfig, Decoder, DispatchError, Json, ParamKind,
        ParamList, Wrapped,
    };
    use crate::context::RequestContext;
    use crate::parser::{HttpRequest, HttpVersion, Method};
    use crate::server::{ResponseWriter, StatusCode};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
    }

    /// Decodes the body as JSON and counts every call.
    #[derive(Default, Clone)]
    struct SpyDecoder {
        calls: Arc<AtomicUsize>,
    }

    impl SpyDecoder {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Decoder for SpyDecoder {
        fn decode<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_slice(&request.body)?)
        }
    }

    fn note_request() -> HttpRequest {
        HttpRequest::new(Method::POST, "/notes", HttpVersion::Http11, HashMap::new())
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"title":"groceries"}"#)
    }

    fn deny(_: HttpRequest) -> Result<HttpRequest, BoxError> {
        Err("token expired".into())
    }

    fn assert_arguments_follow_signature<F, Args>(function: F)
    where
        F: Wrapped<Args>,
        Args: ParamList,
    {
        let broker = Broker::new(function, SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let writer = ResponseWriter::new();
        let arguments = broker.synthesize(note_request(), &writer).unwrap();
        assert_eq!(arguments.len(), broker.signature().len());
        assert_eq!(arguments.kinds(), broker.signature().kinds().as_slice());
    }

    #[test]
    fn test_signature_classifies_parameters() {
        fn everything(_: RequestContext, _: HttpRequest, _: ResponseWriter, _: Note, _: Box<Note>) {}

        let broker = Broker::new(everything, SpyDecoder::default(), AllowAnonymous, AcceptAll);
        assert_eq!(
            broker.signature().kinds(),
            vec![
                ParamKind::RequestContext,
                ParamKind::RawRequest,
                ParamKind::ResponseWriter,
                ParamKind::DecodableBody,
                ParamKind::DecodableBody,
            ]
        );
        let params = broker.signature().params();
        assert_eq!(params[3].position, 3);
        assert!(params[3].type_name.ends_with("Note"));
        assert!(broker.signature().to_string().starts_with("(RequestContext, RawRequest, ResponseWriter"));
    }

    #[test]
    fn test_arguments_follow_signature_in_any_order() {
        assert_arguments_follow_signature(|| ());
        assert_arguments_follow_signature(|_: Note| ());
        assert_arguments_follow_signature(|_: ResponseWriter, _: RequestContext| ());
        assert_arguments_follow_signature(|_: Note, _: HttpRequest, _: Note| ());
        assert_arguments_follow_signature(
            |_: HttpRequest, _: Note, _: ResponseWriter, _: RequestContext, _: Box<Note>, _: RequestContext| (),
        );
    }

    #[test]
    fn test_authentication_failure_is_forbidden_and_skips_everything() {
        init_logging();
        let decoder = SpyDecoder::default();
        let called = Arc::new(AtomicBool::new(false));
        let seen = called.clone();

        let broker = Broker::new(
            move |_: Note| seen.store(true, Ordering::SeqCst),
            decoder.clone(),
            deny,
            AcceptAll,
        );
        let response = broker.dispatch(note_request());

        assert_eq!(response.status, StatusCode::Forbidden);
        assert_eq!(response.body_text(), Some(r#"{"code":"UnAuthorized"}"#));
        assert_eq!(decoder.calls(), 0);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_authentication_failure_beats_decode_failure() {
        let decoder = SpyDecoder::default();
        let broker = Broker::new(|_: Note| (), decoder.clone(), deny, AcceptAll);

        let writer = ResponseWriter::new();
        let result = broker.synthesize(note_request().with_body("not json"), &writer);

        assert!(matches!(result, Err(DispatchError::Unauthorized(_))));
        assert_eq!(decoder.calls(), 0);
    }

    #[test]
    fn test_decode_failure_is_bad_request_and_short_circuits() {
        init_logging();
        struct Failing {
            calls: Arc<AtomicUsize>,
        }

        impl Decoder for Failing {
            fn decode<T: DeserializeOwned>(&self, _: &HttpRequest) -> Result<T, BoxError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err("missing title".into())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let called = Arc::new(AtomicBool::new(false));
        let seen = called.clone();
        let broker = Broker::new(
            move |_: Note, _: Note| seen.store(true, Ordering::SeqCst),
            Failing { calls: calls.clone() },
            AllowAnonymous,
            AcceptAll,
        );

        let response = broker.dispatch(note_request());

        assert_eq!(response.status, StatusCode::BadRequest);
        assert_eq!(response.body_text(), Some(r#"{"code":"missing title"}"#));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_validator_sees_decoded_value() {
        let validator = |value: &dyn Any| -> Result<(), BoxError> {
            match value.downcast_ref::<Note>() {
                Some(note) if note.title.is_empty() => Err("title must not be empty".into()),
                _ => Ok(()),
            }
        };
        let broker = Broker::new(|note: Note| note.title, SpyDecoder::default(), AllowAnonymous, validator);

        let ok = broker.dispatch(note_request());
        assert_eq!(ok.status, StatusCode::Ok);
        assert_eq!(ok.body_text(), Some("groceries"));

        let rejected = broker.dispatch(note_request().with_body(r#"{"title":""}"#));
        assert_eq!(rejected.status, StatusCode::BadRequest);
        assert_eq!(rejected.body_text(), Some(r#"{"code":"title must not be empty"}"#));
    }

    #[test]
    fn test_no_return_value_is_empty_ok() {
        let broker = Broker::new(|_: RequestContext| (), SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_fallible_unit_return() {
        let ok = Broker::new(|| -> Result<(), BoxError> { Ok(()) }, SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let response = ok.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body.is_empty());

        let failing = Broker::new(
            || -> Result<(), BoxError> { Err("quota exceeded".into()) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );
        let response = failing.dispatch(note_request());
        assert_eq!(response.status, StatusCode::BadRequest);
        assert_eq!(response.body_text(), Some(r#"{"code":"quota exceeded"}"#));
        assert_eq!(response.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn test_value_returns() {
        let text = Broker::new(|note: Note| format!("saved {}", note.title), SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let response = text.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"saved groceries");
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("text/plain; charset=utf-8")
        );

        let json = Broker::new(|note: Note| Json(note), SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let response = json.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body_text(), Some(r#"{"title":"groceries"}"#));
    }

    #[test]
    fn test_fallible_text_writes_exact_bytes() {
        let broker = Broker::new(
            || -> Result<String, BoxError> { Ok("héllo\n".to_string()) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, "héllo\n".as_bytes());
    }

    #[test]
    fn test_fallible_value_error_is_bare_bad_request() {
        let broker = Broker::new(
            |_: Note| -> Result<Json<Note>, BoxError> { Err("conflict".into()) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::BadRequest);
        assert!(response.body.is_empty());
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_fallible_value_success_is_not_encoded_by_default() {
        let fallible = |note: Note| -> Result<Json<Note>, BoxError> { Ok(Json(note)) };

        let broker = Broker::new(fallible, SpyDecoder::default(), AllowAnonymous, AcceptAll);
        assert!(!broker.config().encode_fallible_values);
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body.is_empty());

        let broker = Broker::new(fallible, SpyDecoder::default(), AllowAnonymous, AcceptAll)
            .with_config(BrokerConfig { encode_fallible_values: true });
        assert!(broker.config().encode_fallible_values);
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body_text(), Some(r#"{"title":"groceries"}"#));
    }

    #[test]
    fn test_authenticator_replaces_request() {
        let authenticate = |request: HttpRequest| -> Result<HttpRequest, BoxError> {
            let context = request.context.clone().with_value("user", "ada");
            Ok(request.with_header("X-User", "ada").with_context(context))
        };
        let whoami = |ctx: RequestContext, request: HttpRequest| -> String {
            format!(
                "{}/{}",
                ctx.value("user").unwrap_or("-"),
                request.get_header("X-User").map(String::as_str).unwrap_or("-")
            )
        };

        let broker = Broker::new(whoami, SpyDecoder::default(), authenticate, AcceptAll);
        let response = broker.dispatch(note_request());
        assert_eq!(response.body_text(), Some("ada/ada"));
    }

    #[test]
    fn test_function_owned_status_wins() {
        let create = |writer: ResponseWriter, note: Note| {
            writer.set_header("Location", format!("/notes/{}", note.title));
            writer.write_header(StatusCode::Created);
        };

        let broker = Broker::new(create, SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Created);
        assert_eq!(response.headers.get("Location").map(String::as_str), Some("/notes/groceries"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_boxed_body_passes_through() {
        let broker = Broker::new(
            |note: Box<Note>, copy: Note| -> String { (*note == copy).to_string() },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );
        assert_eq!(broker.dispatch(note_request()).body_text(), Some("true"));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("no such note")]
    struct NoteMissing;

    #[test]
    fn test_registered_sentinel_maps_status() {
        let broker = Broker::new(
            || -> Result<(), NoteMissing> { Err(NoteMissing) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        )
        .with_sentinel::<NoteMissing>(StatusCode::NotFound);

        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::NotFound);
        assert_eq!(response.body_text(), Some(r#"{"code":"no such note"}"#));
    }

    #[test]
    fn test_function_returning_unauthorized_is_forbidden() {
        let broker = Broker::new(
            || -> Result<(), crate::broker::Unauthorized> { Err(crate::broker::Unauthorized) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );
        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Forbidden);
        assert_eq!(response.body_text(), Some(r#"{"code":"UnAuthorized"}"#));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("session expired")]
    struct SessionExpired(#[source] crate::broker::Unauthorized);

    #[test]
    fn test_sentinel_matches_wrapped_source() {
        let broker = Broker::new(
            || -> Result<(), SessionExpired> { Err(SessionExpired(crate::broker::Unauthorized)) },
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );

        let wrapped = DispatchError::Application(Box::new(SessionExpired(crate::broker::Unauthorized)));
        assert_eq!(broker.responder().status_for(&wrapped), StatusCode::Forbidden);
        let plain = DispatchError::Application("nope".into());
        assert_eq!(broker.responder().status_for(&plain), StatusCode::BadRequest);

        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Forbidden);
        assert_eq!(response.body_text(), Some(r#"{"code":"session expired"}"#));
    }

    #[test]
    fn test_unencodable_value_is_ok_without_body() {
        init_logging();
        let broker = Broker::new(
            || Json(BTreeMap::from([((1u8, 2u8), 3u8)])),
            SpyDecoder::default(),
            AllowAnonymous,
            AcceptAll,
        );

        let response = broker.dispatch(note_request());
        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body.is_empty());
        assert!(!response.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_repeated_dispatch_is_byte_identical() {
        let broker = Broker::new(|note: Note| Json(note), SpyDecoder::default(), AllowAnonymous, AcceptAll);
        let first = broker.dispatch(note_request()).to_bytes();
        let second = broker.dispatch(note_request()).to_bytes();
        assert_eq!(first, second);

        let denied = Broker::new(|| (), SpyDecoder::default(), deny, AcceptAll);
        assert_eq!(denied.dispatch(note_request()).to_bytes(), denied.dispatch(note_request()).to_bytes());
    }

    #[test]
    fn test_each_request_decodes_its_own_value() {
        let decoder = SpyDecoder::default();
        let broker = Broker::new(|note: Note| note.title, decoder.clone(), AllowAnonymous, AcceptAll);

        let first = broker.dispatch(note_request());
        let second = broker.dispatch(note_request().with_body(r#"{"title":"laundry"}"#));

        assert_eq!(first.body_text(), Some("groceries"));
        assert_eq!(second.body_text(), Some("laundry"));
        assert_eq!(decoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_into_handler_dispatches() {
        let handler = Broker::new(|| "pong", SpyDecoder::default(), AllowAnonymous, AcceptAll).into_handler();
        let response = handler(note_request()).await.unwrap();
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body_text(), Some("pong"));
    }
}
