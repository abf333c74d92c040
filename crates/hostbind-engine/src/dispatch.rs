//! Per-call dispatch
//!
//! Every host call walks the same states:
//!
//! ```text
//! Idle -> Resolving(index) -> Rejected | Bound -> Executing -> Returned | Failed
//! ```
//!
//! Resolving looks the index up in the wrapper type. Binding starts the
//! call on the target, injects environment objects and converts host
//! arguments by their declared types. Asynchronous methods execute on the
//! calling thread; synchronous ones are handed to the owning thread while
//! the caller waits. Results are converted back for the host. Failures are
//! logged with method, index, target and an argument snapshot, then
//! returned; cancellations are returned untouched and not logged.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use hostbind_sdk::{CancellationToken, HostValue, Object, TargetRef, Value};

use crate::config::EngineOptions;
use crate::convert::TypeConverter;
use crate::error::CallError;
use crate::scheduler::{run_on_owner, SyncScheduler};
use crate::synth::{MethodEntry, WrapperType};

/// Named environment objects injected into a call
pub type Environment = Vec<(&'static str, Object)>;

/// Receiver of deferred results: `(signal name, payload)`
pub type SignalSink = Arc<dyn Fn(&str, Vec<HostValue>) -> bool + Send + Sync>;

static NEXT_CALL_ID: AtomicI64 = AtomicI64::new(1);

/// Drives calls for one host protocol
#[derive(Clone)]
pub struct Dispatcher {
    converter: Arc<dyn TypeConverter>,
    scheduler: Arc<dyn SyncScheduler>,
    log_arguments: bool,
    run_inline: bool,
    fallback: Arc<str>,
}

impl Dispatcher {
    /// Dispatcher converting with `converter` and synchronizing on `scheduler`
    pub fn new(
        converter: Arc<dyn TypeConverter>,
        scheduler: Arc<dyn SyncScheduler>,
        options: &EngineOptions,
    ) -> Self {
        Self {
            converter,
            scheduler,
            log_arguments: options.log_arguments,
            run_inline: options.run_inline_on_owner,
            fallback: Arc::from(options.fallback_error_message.as_str()),
        }
    }

    /// Active converter
    pub fn converter(&self) -> &Arc<dyn TypeConverter> {
        &self.converter
    }

    /// Resolving: index to dispatch entry
    pub fn resolve<'w>(&self, wrapper: &'w WrapperType, index: usize) -> Result<&'w MethodEntry, CallError> {
        wrapper.entry(index).ok_or(CallError::InvalidIndex(index))
    }

    /// Run method `index` and wait for its results
    pub fn invoke(
        &self,
        wrapper: &Arc<WrapperType>,
        index: usize,
        target: &TargetRef,
        env: Environment,
        args: Vec<HostValue>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostValue>, CallError> {
        let entry = match self.resolve(wrapper, index) {
            Ok(entry) => entry,
            Err(err) => {
                self.log_failure(wrapper, index, &args, &err);
                return Err(err);
            }
        };
        let asynchronous = entry.is_asynchronous();

        let snapshot = if self.log_arguments { args.clone() } else { Vec::new() };
        let job = self.job(wrapper.clone(), index, target.clone(), env, args);

        let result = if asynchronous {
            job()
        } else {
            run_on_owner(&*self.scheduler, cancel, self.run_inline, job)
        };

        if let Err(err) = &result {
            self.log_failure(wrapper, index, &snapshot, err);
        }
        result
    }

    /// Queue method `index` on the owning thread and return a call id at once.
    ///
    /// When the method finishes, `sink` receives
    /// `(signal, [call_id, results...])`, or `(signal, [call_id, nil, message])`
    /// on failure.
    pub fn invoke_signalled(
        &self,
        wrapper: &Arc<WrapperType>,
        index: usize,
        target: &TargetRef,
        env: Environment,
        args: Vec<HostValue>,
        sink: SignalSink,
    ) -> Result<Vec<HostValue>, CallError> {
        let snapshot = if self.log_arguments { args.clone() } else { Vec::new() };
        let result = self.queue_signalled(wrapper, index, target, env, args, sink, snapshot.clone());
        if let Err(err) = &result {
            self.log_failure(wrapper, index, &snapshot, err);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn queue_signalled(
        &self,
        wrapper: &Arc<WrapperType>,
        index: usize,
        target: &TargetRef,
        env: Environment,
        args: Vec<HostValue>,
        sink: SignalSink,
        snapshot: Vec<HostValue>,
    ) -> Result<Vec<HostValue>, CallError> {
        let entry = self.resolve(wrapper, index)?;
        let signal = entry
            .return_signal()
            .ok_or_else(|| CallError::InvalidState(format!("{} has no return signal", entry.name())))?
            .to_string();

        let call_id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let id_value = self
            .converter
            .to_host(&Value::Int(call_id))
            .map_err(|e| CallError::invocation(e.to_string()))?;

        let job = self.job(wrapper.clone(), index, target.clone(), env, args);
        let dispatcher = self.clone();
        let owned_wrapper = wrapper.clone();
        let task_id = id_value.clone();

        self.scheduler
            .submit(Box::new(move || {
                let mut payload = vec![task_id];
                match job() {
                    Ok(results) => payload.extend(results),
                    Err(err) => {
                        dispatcher.log_failure(&owned_wrapper, index, &snapshot, &err);
                        payload.push(HostValue::Nil);
                        payload.push(HostValue::String(err.to_string()));
                    }
                }
                if !sink(&signal, payload) {
                    tracing::warn!(signal = signal.as_str(), call_id, "Dropped return signal");
                }
            }))
            .map_err(|err| CallError::InvalidState(err.to_string()))?;

        Ok(vec![id_value])
    }

    /// Binding, execution and result conversion as one movable job
    fn job(
        &self,
        wrapper: Arc<WrapperType>,
        index: usize,
        target: TargetRef,
        env: Environment,
        args: Vec<HostValue>,
    ) -> impl FnOnce() -> Result<Vec<HostValue>, CallError> + Send + 'static {
        let converter = self.converter.clone();
        let fallback = self.fallback.clone();
        move || {
            let entry = wrapper.entry(index).ok_or(CallError::InvalidIndex(index))?;

            let mut call = entry
                .executor()
                .start_call(&target)?
                .with_fallback_message(fallback);
            for (name, object) in env {
                call = call.set_env(name, object);
            }

            let values = args
                .iter()
                .enumerate()
                .map(|(i, arg)| converter.from_host(arg, entry.arg_type(i)))
                .collect::<Result<Vec<Value>, _>>()
                .map_err(|e| CallError::invocation(e.to_string()))?;

            let results = call.call(values)?;
            converter
                .to_host_all(&results)
                .map_err(|e| CallError::invocation(e.to_string()))
        }
    }

    /// Failed: record what was called with what
    pub(crate) fn log_failure(&self, wrapper: &WrapperType, index: usize, args: &[HostValue], err: &CallError) {
        let method = wrapper.methods().name(index).unwrap_or("<invalid>");
        self.log_call_failure(wrapper, method, Some(index), args, err);
    }

    /// Rejected before an index was known, e.g. an unknown symbol
    pub(crate) fn log_unresolved(&self, wrapper: &WrapperType, method: &str, args: &[HostValue], err: &CallError) {
        self.log_call_failure(wrapper, method, None, args, err);
    }

    fn log_call_failure(
        &self,
        wrapper: &WrapperType,
        method: &str,
        index: Option<usize>,
        args: &[HostValue],
        err: &CallError,
    ) {
        if err.is_cancelled() {
            tracing::trace!(method, index, target = wrapper.class_name(), "Call cancelled");
            return;
        }
        let args = if self.log_arguments {
            render_args(args)
        } else {
            "<omitted>".to_string()
        };
        let position = index.map_or_else(|| "-".to_string(), |i| i.to_string());
        tracing::debug!(
            method,
            index,
            target = wrapper.class_name(),
            args = %args,
            error = %err,
            "Error during method {}({}) execution on {}",
            method,
            position,
            wrapper.class_name()
        );
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("log_arguments", &self.log_arguments)
            .field("run_inline", &self.run_inline)
            .finish()
    }
}

fn render_args(args: &[HostValue]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ArgumentDescriptor, ExposedMethods, MethodDeclaration, MethodRegistry, MethodSource};
    use crate::convert::LuaConverter;
    use crate::scheduler::OwnerThread;
    use crate::synth::{WrapperKey, WrapperStyle, WrapperSynthesizer};
    use hostbind_sdk::{Capabilities, ValueType};

    struct Meter {
        reading: f64,
    }

    fn setup() -> (Dispatcher, Arc<WrapperType>, TargetRef) {
        let registry = MethodRegistry::new();
        registry.register_source(
            MethodSource::on::<Meter>()
                .method(
                    MethodDeclaration::new("read").returns(ValueType::Number).asynchronous(),
                    |meter, _| Ok(vec![Value::Number(meter.reading)]),
                )
                .method(
                    MethodDeclaration::new("scale")
                        .arg(ArgumentDescriptor::required("factor", ValueType::Integer)),
                    |meter, inv| {
                        let factor: i64 = inv.arg(0)?;
                        Ok(vec![Value::Number(meter.reading * factor as f64)])
                    },
                )
                .method(MethodDeclaration::new("fail").asynchronous(), |_, _| {
                    Err("sensor offline".into())
                }),
        );
        let target = TargetRef::new(Meter { reading: 1.5 });
        let (revision, exposed): (u64, Arc<ExposedMethods>) = registry.snapshot(target.class());
        let key = WrapperKey::new(
            (**target.class()).clone(),
            WrapperStyle::Peripheral,
            Capabilities::default(),
            exposed.keys().cloned(),
            revision,
        );
        let wrapper = WrapperSynthesizer::new().synthesize(key, &exposed);
        let scheduler: Arc<dyn SyncScheduler> = Arc::new(OwnerThread::spawn("dispatch-test").unwrap());
        let dispatcher = Dispatcher::new(Arc::new(LuaConverter), scheduler, &EngineOptions::default());
        (dispatcher, wrapper, target)
    }

    #[test]
    fn test_invoke_async_and_sync() {
        let (dispatcher, wrapper, target) = setup();
        let token = CancellationToken::new();
        let read = wrapper.methods().index_of("read").unwrap();
        let scale = wrapper.methods().index_of("scale").unwrap();

        let result = dispatcher
            .invoke(&wrapper, read, &target, Vec::new(), vec![], &token)
            .unwrap();
        assert_eq!(result, vec![HostValue::Number(1.5)]);

        let result = dispatcher
            .invoke(&wrapper, scale, &target, Vec::new(), vec![HostValue::Number(2.0)], &token)
            .unwrap();
        assert_eq!(result, vec![HostValue::Number(3.0)]);
    }

    #[test]
    fn test_invalid_index_rejected() {
        let (dispatcher, wrapper, target) = setup();
        let token = CancellationToken::new();
        let err = dispatcher
            .invoke(&wrapper, 99, &target, Vec::new(), vec![], &token)
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidIndex(99)));
    }

    #[test]
    fn test_failure_message_and_conversion_error() {
        let (dispatcher, wrapper, target) = setup();
        let token = CancellationToken::new();
        let fail = wrapper.methods().index_of("fail").unwrap();
        let err = dispatcher
            .invoke(&wrapper, fail, &target, Vec::new(), vec![], &token)
            .unwrap_err();
        assert_eq!(err.to_string(), "sensor offline");

        let scale = wrapper.methods().index_of("scale").unwrap();
        let err = dispatcher
            .invoke(&wrapper, scale, &target, Vec::new(), vec![HostValue::Number(0.5)], &token)
            .unwrap_err();
        assert_eq!(err.to_string(), "bad argument: expected integer, got number");
    }

    #[test]
    fn test_render_args() {
        assert_eq!(
            render_args(&[HostValue::Number(1.0), HostValue::from("x")]),
            "[1, \"x\"]"
        );
    }
}
