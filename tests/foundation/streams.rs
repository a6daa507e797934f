//! Integration tests for ValueStream

use aro_foundation::{Value, ValueStream};

#[test]
fn producer_and_consumer_share_the_buffer() {
    let producer = ValueStream::new();
    let consumer = producer.clone();
    assert!(producer.push(Value::Int(1)));
    assert!(producer.push(Value::Int(2)));
    assert_eq!(consumer.buffered(), 2);
    assert_eq!(consumer.next_item(), Some(Value::Int(1)));
    assert_eq!(consumer.drain(), vec![Value::Int(2)]);
}

#[test]
fn closed_streams_reject_items() {
    let stream = ValueStream::new();
    stream.close();
    assert!(stream.is_closed());
    assert!(!stream.push(Value::Null));
}

#[test]
fn materialize_drains_into_a_list() {
    let stream = ValueStream::from_items([Value::from("a"), Value::from("b")]);
    let value = Value::Stream(stream.clone()).materialize();
    assert_eq!(value, Value::list(["a", "b"]));
    assert_eq!(stream.buffered(), 0);
}

#[test]
fn stream_equality_is_identity() {
    let a = ValueStream::from_items([Value::Int(1)]);
    let b = ValueStream::from_items([Value::Int(1)]);
    assert_eq!(Value::Stream(a.clone()), Value::Stream(a));
    assert_ne!(Value::Stream(b), Value::Stream(ValueStream::from_items([Value::Int(1)])));
}
