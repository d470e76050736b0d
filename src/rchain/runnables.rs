//! Composable pipeline steps.
//!
//! Every step implements [`Runnable`] for one input type, so `a.pipe(b)`
//! type-checks only when `b` accepts what `a` produces.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use crate::rchain::messages::AIMessage;
use crate::rchain::prompts::TemplateError;
use crate::rchain::provider::ProviderError;
use crate::rchain::vectorstores::VectorStoreError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Retrieval(#[from] VectorStoreError),
    #[error("{0}")]
    Step(String),
}

impl ChainError {
    pub fn step(message: impl fmt::Display) -> Self {
        Self::Step(message.to_string())
    }
}

#[async_trait]
pub trait Runnable<I>: Send + Sync
where
    I: Send + 'static,
{
    type Output: Send + 'static;

    async fn invoke(&self, input: I) -> Result<Self::Output, ChainError>;
}

pub type BoxRunnable<I, O> = Box<dyn Runnable<I, Output = O>>;

#[async_trait]
impl<I, O> Runnable<I> for BoxRunnable<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn invoke(&self, input: I) -> Result<O, ChainError> {
        (**self).invoke(input).await
    }
}

pub trait RunnableExt<I>: Runnable<I> + Sized
where
    I: Send + 'static,
{
    /// Feeds this step's output into `next`.
    fn pipe<N>(self, next: N) -> RunnableSequence<Self, N>
    where
        N: Runnable<Self::Output>,
    {
        RunnableSequence::new(self, next)
    }

    fn boxed(self) -> BoxRunnable<I, Self::Output>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<I, R> RunnableExt<I> for R
where
    I: Send + 'static,
    R: Runnable<I>,
{
}

/// Two steps run back to back.
#[derive(Debug, Clone)]
pub struct RunnableSequence<A, B> {
    first: A,
    second: B,
}

impl<A, B> RunnableSequence<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<I, A, B> Runnable<I> for RunnableSequence<A, B>
where
    I: Send + 'static,
    A: Runnable<I>,
    B: Runnable<A::Output>,
{
    type Output = B::Output;

    async fn invoke(&self, input: I) -> Result<B::Output, ChainError> {
        let intermediate = self.first.invoke(input).await?;
        self.second.invoke(intermediate).await
    }
}

/// Fallible synchronous closure step.
pub struct RunnableLambda<F, I, O> {
    func: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<F, I, O> RunnableLambda<F, I, O>
where
    F: Fn(I) -> Result<O, ChainError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

/// Wraps an infallible closure.
pub fn lambda<I, O, F>(func: F) -> RunnableLambda<impl Fn(I) -> Result<O, ChainError> + Send + Sync, I, O>
where
    F: Fn(I) -> O + Send + Sync,
{
    RunnableLambda::new(move |input: I| Ok(func(input)))
}

impl<F, I, O> fmt::Debug for RunnableLambda<F, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RunnableLambda")
    }
}

#[async_trait]
impl<F, I, O> Runnable<I> for RunnableLambda<F, I, O>
where
    F: Fn(I) -> Result<O, ChainError> + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn invoke(&self, input: I) -> Result<O, ChainError> {
        (self.func)(input)
    }
}

/// Closure step returning a future, for calls that must await.
pub struct AsyncRunnableLambda<F, I, O> {
    func: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<F, Fut, I, O> AsyncRunnableLambda<F, I, O>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ChainError>> + Send,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, I, O> Runnable<I> for AsyncRunnableLambda<F, I, O>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ChainError>> + Send,
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn invoke(&self, input: I) -> Result<O, ChainError> {
        (self.func)(input).await
    }
}

/// Runs named branches concurrently on clones of one input.
pub struct RunnableParallel<I, O> {
    branches: Vec<(String, BoxRunnable<I, O>)>,
}

impl<I, O> RunnableParallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
        }
    }

    pub fn branch<R>(mut self, name: impl Into<String>, runnable: R) -> Self
    where
        R: Runnable<I, Output = O> + 'static,
    {
        self.branches.push((name.into(), Box::new(runnable)));
        self
    }
}

impl<I, O> Default for RunnableParallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Runnable<I> for RunnableParallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Output = BTreeMap<String, O>;

    async fn invoke(&self, input: I) -> Result<BTreeMap<String, O>, ChainError> {
        debug!(branches = self.branches.len(), "running parallel branches");
        let runs = self.branches.iter().map(|(name, branch)| {
            let input = input.clone();
            async move {
                let output = branch.invoke(input).await?;
                Ok::<_, ChainError>((name.clone(), output))
            }
        });
        Ok(try_join_all(runs).await?.into_iter().collect())
    }
}

type Condition<I> = Box<dyn Fn(&I) -> bool + Send + Sync>;

/// Routes the input to the first branch whose condition holds.
pub struct RunnableBranch<I, O> {
    branches: Vec<(Condition<I>, BoxRunnable<I, O>)>,
    default: BoxRunnable<I, O>,
}

impl<I, O> RunnableBranch<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<R>(default: R) -> Self
    where
        R: Runnable<I, Output = O> + 'static,
    {
        Self {
            branches: Vec::new(),
            default: Box::new(default),
        }
    }

    /// Adds a branch after those already registered.
    pub fn when<C, R>(mut self, condition: C, runnable: R) -> Self
    where
        C: Fn(&I) -> bool + Send + Sync + 'static,
        R: Runnable<I, Output = O> + 'static,
    {
        self.branches.push((Box::new(condition), Box::new(runnable)));
        self
    }
}

#[async_trait]
impl<I, O> Runnable<I> for RunnableBranch<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn invoke(&self, input: I) -> Result<O, ChainError> {
        let selected = self
            .branches
            .iter()
            .position(|(condition, _)| condition(&input));
        debug!(?selected, "branch selected");
        match selected {
            Some(index) => self.branches[index].1.invoke(input).await,
            None => self.default.invoke(input).await,
        }
    }
}

/// Extracts the text content of a model reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

#[async_trait]
impl Runnable<AIMessage> for StrOutputParser {
    type Output = String;

    async fn invoke(&self, input: AIMessage) -> Result<String, ChainError> {
        Ok(input.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_count(text: String) -> String {
        format!("Word count: {}\n", text.split_whitespace().count())
    }

    #[tokio::test]
    async fn pipe_runs_steps_in_order() {
        let chain = lambda(|text: String| text.to_uppercase()).pipe(lambda(word_count));
        let result = chain.invoke("why did the lawyer cross".to_string()).await.unwrap();
        assert_eq!(result, "Word count: 5\n");
    }

    #[tokio::test]
    async fn str_output_parser_returns_content() {
        let parsed = StrOutputParser.invoke(AIMessage::new("joke")).await.unwrap();
        assert_eq!(parsed, "joke");
    }

    #[tokio::test]
    async fn failing_lambda_short_circuits() {
        let chain = RunnableLambda::new(|_: String| Err::<String, _>(ChainError::step("boom")))
            .pipe(lambda(|text: String| text.len()));
        let err = chain.invoke(String::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn async_lambda_awaits() {
        let step = AsyncRunnableLambda::new(|n: u32| async move { Ok(n * 2) });
        assert_eq!(step.invoke(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn parallel_collects_every_branch() {
        let parallel = RunnableParallel::new()
            .branch("pros", lambda(|features: String| format!("pros of {features}")))
            .branch("cons", lambda(|features: String| format!("cons of {features}")));
        let result = parallel.invoke("battery".to_string()).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result["pros"], "pros of battery");
        assert_eq!(result["cons"], "cons of battery");
    }

    #[tokio::test]
    async fn branch_takes_first_match_then_default() {
        let branch = RunnableBranch::new(lambda(|_: String| "escalate"))
            .when(|x: &String| x.contains("positive"), lambda(|_: String| "thank you"))
            .when(|x: &String| x.contains("negative"), lambda(|_: String| "sorry"));

        assert_eq!(branch.invoke("positive".to_string()).await.unwrap(), "thank you");
        assert_eq!(branch.invoke("very negative".to_string()).await.unwrap(), "sorry");
        assert_eq!(branch.invoke("unclear".to_string()).await.unwrap(), "escalate");
    }

    #[tokio::test]
    async fn boxed_runnables_compose() {
        let boxed: BoxRunnable<String, usize> = lambda(|text: String| text.len()).boxed();
        let chain = boxed.pipe(lambda(|n: usize| n + 1));
        assert_eq!(chain.invoke("four".to_string()).await.unwrap(), 5);
    }
}
